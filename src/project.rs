//! MSBuild project descriptors (`.csproj`)
//!
//! Only what the analysis needs is evaluated: compile items, project
//! references, `DefineConstants` and `AssemblyName`. Conditional groups and
//! items are skipped.

use crate::model::decode;
use crate::processor::ProcessError;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

/// Compile items of SDK-style projects that never count as sources
const DEFAULT_EXCLUDES: [&str; 2] = ["bin/**", "obj/**"];

#[derive(Debug, Clone, PartialEq, Eq)]
enum ItemOp {
    Include(String),
    Remove(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub path: PathBuf,
    /// `AssemblyName`, or the file stem
    pub name: String,
    pub sdk_style: bool,
    /// Compile items, in evaluation order
    pub sources: Vec<PathBuf>,
    /// Referenced project descriptors, normalized
    pub references: Vec<PathBuf>,
    /// Preprocessor symbols from `DefineConstants`
    pub defines: Vec<String>,
}

impl Project {
    pub fn load(path: &Path) -> Result<Self, ProcessError> {
        let text = std::fs::read(path)
            .and_then(|bytes| decode(&bytes))
            .map_err(|source| ProcessError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Self::parse(path, &text)
    }

    pub fn parse(path: &Path, text: &str) -> Result<Self, ProcessError> {
        let descriptor = Descriptor::read(path, text)?;
        let base = base_dir(path);

        let name = descriptor
            .properties
            .get("AssemblyName")
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty() && !n.contains("$("))
            .unwrap_or_else(|| {
                path.file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default()
            });

        let enabled = |key: &str| {
            descriptor
                .properties
                .get(key)
                .map_or(true, |v| !v.trim().eq_ignore_ascii_case("false"))
        };
        let default_items =
            descriptor.sdk_style && enabled("EnableDefaultItems") && enabled("EnableDefaultCompileItems");

        let defines = descriptor
            .properties
            .get("DefineConstants")
            .map(|v| split_list(v).filter(|d| !d.starts_with("$(")).collect())
            .unwrap_or_default();

        let references = descriptor
            .references
            .iter()
            .map(|r| normalize(&base.join(r)))
            .collect();

        let sources = compile_items(&base, default_items, &descriptor.compile);
        log::debug!(
            "{}: {} source(s), {} reference(s), sdk-style {}",
            path.display(),
            sources.len(),
            descriptor.references.len(),
            descriptor.sdk_style
        );

        Ok(Self {
            path: path.to_path_buf(),
            name,
            sdk_style: descriptor.sdk_style,
            sources,
            references,
            defines,
        })
    }
}

/// Raw contents of a project file
#[derive(Debug, Default)]
struct Descriptor {
    sdk_style: bool,
    properties: HashMap<String, String>,
    compile: Vec<ItemOp>,
    references: Vec<String>,
}

impl Descriptor {
    fn read(path: &Path, text: &str) -> Result<Self, ProcessError> {
        let mut reader = Reader::from_str(text);
        reader.config_mut().trim_text(true);

        let malformed = |message: String| ProcessError::MalformedProject {
            path: path.to_path_buf(),
            message,
        };

        let mut descriptor = Descriptor::default();
        // Open elements with their "conditional" flag
        let mut stack: Vec<(String, bool)> = Vec::new();
        let mut buf = Vec::new();

        loop {
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|e| malformed(format!("{} at byte {}", e, reader.buffer_position())))?;
            match event {
                Event::Start(e) => {
                    let (name, conditional) = descriptor.element(&e, &stack);
                    stack.push((name, conditional));
                }
                Event::Empty(e) => {
                    descriptor.element(&e, &stack);
                }
                Event::End(_) => {
                    stack.pop();
                }
                Event::Text(e) => {
                    let value = e
                        .unescape()
                        .map_err(|err| malformed(err.to_string()))?
                        .into_owned();
                    descriptor.property(&stack, value);
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if !stack.is_empty() {
            return Err(malformed(format!("unclosed element <{}>", stack[stack.len() - 1].0)));
        }
        Ok(descriptor)
    }

    /// Record what an element contributes; returns its name and whether it
    /// sits under a condition
    fn element(&mut self, e: &BytesStart<'_>, stack: &[(String, bool)]) -> (String, bool) {
        let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
        let attrs = attributes(e);
        let conditional = attrs.contains_key("Condition") || stack.last().is_some_and(|(_, c)| *c);

        if attrs.contains_key("Sdk") && matches!(name.as_str(), "Project" | "Import" | "Sdk") {
            self.sdk_style = true;
        }
        if name == "Sdk" && attrs.contains_key("Name") {
            self.sdk_style = true;
        }

        let in_item_group = stack.last().is_some_and(|(parent, _)| parent == "ItemGroup");
        if in_item_group {
            if conditional {
                log::debug!("Skipping conditional item <{}>", name);
            } else if name == "Compile" {
                if let Some(include) = attrs.get("Include") {
                    self.compile.extend(split_list(include).map(ItemOp::Include));
                }
                if let Some(remove) = attrs.get("Remove") {
                    self.compile.extend(split_list(remove).map(ItemOp::Remove));
                }
            } else if name == "ProjectReference" {
                if let Some(include) = attrs.get("Include") {
                    self.references.extend(split_list(include));
                }
            }
        }
        (name, conditional)
    }

    fn property(&mut self, stack: &[(String, bool)], value: String) {
        let [.., (group, _), (name, conditional)] = stack else {
            return;
        };
        if group != "PropertyGroup" {
            return;
        }
        if *conditional {
            log::debug!("Skipping conditional property {}", name);
            return;
        }
        let value = match self.properties.get(name) {
            Some(previous) => value.replace(&format!("$({})", name), previous),
            None => value.replace(&format!("$({})", name), ""),
        };
        self.properties.insert(name.clone(), value);
    }
}

fn attributes(e: &BytesStart<'_>) -> HashMap<String, String> {
    e.attributes()
        .flatten()
        .map(|attr| {
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned());
            (key, value)
        })
        .collect()
}

/// `a;b, c` -> `a`, `b`, `c` with Windows separators turned into `/`
fn split_list(value: &str) -> impl Iterator<Item = String> + '_ {
    value
        .split([';', ','])
        .map(|s| s.trim().replace('\\', "/"))
        .filter(|s| !s.is_empty())
}

fn base_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Resolve `.` and `..` lexically
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                } else {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

fn relative(base: &Path, path: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

fn matcher(patterns: &[&str]) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        match GlobBuilder::new(pattern).literal_separator(true).build() {
            Ok(glob) => {
                builder.add(glob);
            }
            Err(err) => log::warn!("Ignoring item pattern '{}': {}", pattern, err),
        }
    }
    builder.build().unwrap_or_else(|err| {
        log::warn!("Ignoring item patterns {:?}: {}", patterns, err);
        GlobSet::empty()
    })
}

/// Files an item pattern names, relative to `base`
fn expand(base: &Path, pattern: &str) -> Vec<PathBuf> {
    if pattern.contains("$(") {
        log::warn!("Ignoring item with unexpanded property: {}", pattern);
        return Vec::new();
    }
    if !pattern.contains(['*', '?']) {
        return vec![normalize(&base.join(pattern))];
    }

    let full = format!(
        "{}/{}",
        glob::Pattern::escape(&base.to_string_lossy()),
        pattern
    );
    match glob::glob(&full) {
        Ok(paths) => paths
            .flatten()
            .filter(|p| p.is_file())
            .map(|p| normalize(&p))
            .collect(),
        Err(err) => {
            log::warn!("Ignoring item pattern '{}': {}", pattern, err);
            Vec::new()
        }
    }
}

fn compile_items(base: &Path, default_items: bool, ops: &[ItemOp]) -> Vec<PathBuf> {
    let base = normalize(base);
    let mut sources: Vec<PathBuf> = Vec::new();

    if default_items {
        let excluded = matcher(&DEFAULT_EXCLUDES);
        sources.extend(
            expand(&base, "**/*.cs")
                .into_iter()
                .filter(|p| !excluded.is_match(relative(&base, p))),
        );
    }

    for op in ops {
        match op {
            ItemOp::Include(pattern) => {
                for path in expand(&base, pattern) {
                    if !sources.contains(&path) {
                        sources.push(path);
                    }
                }
            }
            ItemOp::Remove(pattern) => {
                let removed = matcher(&[pattern.as_str()]);
                let literal = normalize(&base.join(pattern));
                sources.retain(|p| *p != literal && !removed.is_match(relative(&base, p)));
            }
        }
    }
    sources
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn touch(dir: &Path, relative: &str) {
        let path = dir.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "class A {}").unwrap();
    }

    fn write_project(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        path
    }

    fn names(project: &Project) -> Vec<String> {
        project
            .sources
            .iter()
            .map(|p| relative(&normalize(project.path.parent().unwrap()), p))
            .collect()
    }

    #[test]
    fn test_sdk_style_default_items() {
        let dir = TempDir::new().unwrap();
        for file in ["A.cs", "sub/B.cs", "bin/Debug/Gen.cs", "obj/X.cs", "notes.txt"] {
            touch(dir.path(), file);
        }
        let path = write_project(dir.path(), "App.csproj", r#"<Project Sdk="Microsoft.NET.Sdk"></Project>"#);

        let project = Project::load(&path).unwrap();
        assert!(project.sdk_style);
        assert_eq!(project.name, "App");
        assert_eq!(names(&project), vec!["A.cs", "sub/B.cs"]);
    }

    #[test]
    fn test_compile_remove_and_include() {
        let dir = TempDir::new().unwrap();
        for file in ["A.cs", "Generated/G1.cs", "Generated/G2.cs"] {
            touch(dir.path(), file);
        }
        let path = write_project(
            dir.path(),
            "App.csproj",
            r#"<Project Sdk="Microsoft.NET.Sdk">
                 <ItemGroup>
                   <Compile Remove="Generated\**" />
                   <Compile Include="Generated\G2.cs" />
                 </ItemGroup>
               </Project>"#,
        );

        let project = Project::load(&path).unwrap();
        assert_eq!(names(&project), vec!["A.cs", "Generated/G2.cs"]);
    }

    #[test]
    fn test_default_items_disabled() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "A.cs");
        touch(dir.path(), "B.cs");
        let path = write_project(
            dir.path(),
            "App.csproj",
            r#"<Project Sdk="Microsoft.NET.Sdk">
                 <PropertyGroup><EnableDefaultCompileItems>false</EnableDefaultCompileItems></PropertyGroup>
                 <ItemGroup><Compile Include="B.cs" /></ItemGroup>
               </Project>"#,
        );

        let project = Project::load(&path).unwrap();
        assert_eq!(names(&project), vec!["B.cs"]);
    }

    #[test]
    fn test_legacy_project() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "Extra.cs");
        let path = write_project(
            dir.path(),
            "Legacy.csproj",
            r#"<?xml version="1.0" encoding="utf-8"?>
               <Project ToolsVersion="15.0" xmlns="http://schemas.microsoft.com/developer/msbuild/2003">
                 <PropertyGroup>
                   <AssemblyName>Legacy.Core</AssemblyName>
                   <DefineConstants>$(DefineConstants);PORTED;TRACE</DefineConstants>
                 </PropertyGroup>
                 <PropertyGroup Condition=" '$(Configuration)' == 'Debug' ">
                   <DefineConstants>DEBUG</DefineConstants>
                 </PropertyGroup>
                 <ItemGroup>
                   <Compile Include="Properties\AssemblyInfo.cs" />
                   <Compile Include="Main.cs" />
                 </ItemGroup>
                 <ItemGroup>
                   <ProjectReference Include="..\Lib\Lib.csproj">
                     <Project>{7C3F9C2E-0000-4000-8000-000000000001}</Project>
                   </ProjectReference>
                 </ItemGroup>
               </Project>"#,
        );

        let project = Project::load(&path).unwrap();
        assert!(!project.sdk_style);
        assert_eq!(project.name, "Legacy.Core");
        assert_eq!(names(&project), vec!["Properties/AssemblyInfo.cs", "Main.cs"]);
        assert_eq!(project.defines, vec!["PORTED", "TRACE"]);
        assert_eq!(
            project.references,
            vec![normalize(&dir.path().join("../Lib/Lib.csproj"))]
        );
    }

    #[test]
    fn test_malformed_project() {
        let err = Project::parse(Path::new("Bad.csproj"), "<Project><ItemGroup></Project>").unwrap_err();
        assert!(matches!(err, ProcessError::MalformedProject { .. }), "{}", err);
    }

    #[test]
    fn test_missing_project() {
        let dir = TempDir::new().unwrap();
        let err = Project::load(&dir.path().join("Nope.csproj")).unwrap_err();
        assert!(matches!(err, ProcessError::Io { .. }));
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("a/./b/../c")), PathBuf::from("a/c"));
        assert_eq!(normalize(Path::new("../x/../../y")), PathBuf::from("../../y"));
        assert_eq!(normalize(Path::new("a/..")), PathBuf::from("."));
    }
}
