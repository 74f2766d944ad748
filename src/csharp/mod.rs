//! C# front end: lexer, declaration parser and type resolver
//!
//! ```text
//! text -> lexer -> tokens -> parser -> SyntaxTree -> Compilation -> UnitModel
//! ```

pub mod compilation;
pub mod lexer;
pub mod parser;
pub mod platform;
pub mod syntax;

pub use compilation::{Compilation, TreeId, UnitModel};
pub use lexer::{LineMap, Token, TokenKind};
pub use syntax::{SyntaxTree, TypeDecl, TypeKind};
