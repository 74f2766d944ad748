//! Semantic model seam between the front end and the rule detectors

use crate::csharp::syntax::{SyntaxTree, TypeDeclId};
use crate::diagnostic::Diagnostic;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub type SymbolId = usize;

/// A type argument, or a type in argument position
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeArg {
    Type(TypeSymbol),
    /// Unsubstituted type parameter
    Param(String),
    Array(Box<TypeArg>, usize),
    Nullable(Box<TypeArg>),
    Pointer(Box<TypeArg>),
    Tuple(Vec<TypeArg>),
}

/// A resolved, possibly constructed, named type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeSymbol {
    pub def: SymbolId,
    pub args: Vec<TypeArg>,
}

impl TypeSymbol {
    pub fn new(def: SymbolId, args: Vec<TypeArg>) -> Self {
        Self { def, args }
    }
}

/// What the detectors need from a resolver
pub trait SemanticModel {
    /// Symbol declared by a type declaration of the unit's tree
    fn declared_type(&self, decl: TypeDeclId) -> Option<TypeSymbol>;

    /// Directly declared base interfaces, in declaration order
    fn base_interfaces(&self, ty: &TypeSymbol) -> Vec<TypeSymbol>;

    /// Qualified names of the attribute classes applied to the type
    fn markers(&self, ty: &TypeSymbol) -> Vec<String>;

    /// Qualified display name, `N.IA<int>`
    fn display_name(&self, ty: &TypeSymbol) -> String;

    fn is_interface(&self, ty: &TypeSymbol) -> bool;
}

/// One source file
#[derive(Debug, Clone)]
pub struct SourceUnit {
    pub path: PathBuf,
    pub text: Arc<str>,
}

impl SourceUnit {
    pub fn new(path: impl Into<PathBuf>, text: impl Into<Arc<str>>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
        }
    }

    /// Read a unit from disk, decoded by its byte order mark (UTF-8 without
    /// one). The mark itself is dropped.
    pub fn read(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(Self::new(path, decode(&bytes)?))
    }
}

fn invalid_data<E>(error: E) -> std::io::Error
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    std::io::Error::new(std::io::ErrorKind::InvalidData, error)
}

fn decode_utf16(bytes: &[u8], unit: fn([u8; 2]) -> u16) -> std::io::Result<String> {
    if bytes.len() % 2 != 0 {
        return Err(invalid_data("UTF-16 text with an odd number of bytes"));
    }
    let units: Vec<u16> = bytes.chunks_exact(2).map(|c| unit([c[0], c[1]])).collect();
    Ok(String::from_utf16_lossy(&units))
}

/// Source text from raw bytes: UTF-8 (optionally marked), UTF-16LE or UTF-16BE
pub fn decode(bytes: &[u8]) -> std::io::Result<String> {
    match bytes {
        [0xFF, 0xFE, rest @ ..] => decode_utf16(rest, u16::from_le_bytes),
        [0xFE, 0xFF, rest @ ..] => decode_utf16(rest, u16::from_be_bytes),
        _ => {
            let text = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
            std::str::from_utf8(text).map(str::to_owned).map_err(invalid_data)
        }
    }
}

/// A unit after parse and resolve, owned by the unit processor while it runs
pub struct ParsedUnit<'a, M: SemanticModel> {
    pub tree: &'a SyntaxTree,
    pub model: M,
    /// Compile diagnostics of this unit only
    pub diagnostics: Vec<Diagnostic>,
}

impl<M: SemanticModel> ParsedUnit<'_, M> {
    pub fn path(&self) -> &Path {
        &self.tree.path
    }

    pub fn has_compile_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}
