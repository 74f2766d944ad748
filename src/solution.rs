//! Solution descriptors (`.sln`, `.slnx`) and project build order

use crate::model::decode;
use crate::processor::ProcessError;
use crate::project::normalize;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static PROJECT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^Project\("\{[^}]*\}"\)\s*=\s*"([^"]*)"\s*,\s*"([^"]*)"\s*,\s*"(\{[^}]*\})""#)
        .expect("solution project pattern")
});

static DEPENDENCY_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\{[^}]*\})\s*=\s*\{[^}]*\}").expect("solution dependency pattern"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolutionProject {
    pub name: String,
    /// Project descriptor, normalized
    pub path: PathBuf,
    /// Build dependencies declared by the solution itself
    pub dependencies: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution {
    pub path: PathBuf,
    /// C# projects in declaration order
    pub projects: Vec<SolutionProject>,
}

fn is_csharp_project(path: &str) -> bool {
    path.to_ascii_lowercase().ends_with(".csproj")
}

fn solution_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

impl Solution {
    pub fn load(path: &Path) -> Result<Self, ProcessError> {
        let text = std::fs::read(path)
            .and_then(|bytes| decode(&bytes))
            .map_err(|source| ProcessError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let is_slnx = path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("slnx"));
        if is_slnx {
            Self::parse_slnx(path, &text)
        } else {
            Self::parse_sln(path, &text)
        }
    }

    /// Classic text format
    pub fn parse_sln(path: &Path, text: &str) -> Result<Self, ProcessError> {
        let base = solution_dir(path);
        let mut projects: Vec<SolutionProject> = Vec::new();
        let mut guids: HashMap<String, PathBuf> = HashMap::new();
        // Dependencies by GUID until every project is known
        let mut pending: Vec<Vec<String>> = Vec::new();
        let mut current: Option<usize> = None;
        let mut in_dependencies = false;
        let mut saw_header = false;

        for raw in text.lines() {
            let line = raw.trim();
            if line.starts_with("Microsoft Visual Studio Solution File") {
                saw_header = true;
            } else if let Some(caps) = PROJECT_LINE.captures(line) {
                let name = caps[1].to_string();
                let relative = caps[2].replace('\\', "/");
                let guid = caps[3].to_ascii_uppercase();
                if !is_csharp_project(&relative) {
                    log::debug!("{}: skipping non C# entry {}", path.display(), name);
                    current = None;
                    continue;
                }
                let project_path = normalize(&base.join(&relative));
                guids.insert(guid, project_path.clone());
                projects.push(SolutionProject {
                    name,
                    path: project_path,
                    dependencies: Vec::new(),
                });
                pending.push(Vec::new());
                current = Some(projects.len() - 1);
            } else if line == "EndProject" {
                current = None;
            } else if line.starts_with("ProjectSection(ProjectDependencies)") {
                in_dependencies = true;
            } else if line == "EndProjectSection" {
                in_dependencies = false;
            } else if in_dependencies {
                if let (Some(index), Some(caps)) = (current, DEPENDENCY_LINE.captures(line)) {
                    pending[index].push(caps[1].to_ascii_uppercase());
                }
            }
        }

        if !saw_header {
            return Err(ProcessError::MalformedSolution {
                path: path.to_path_buf(),
                message: "missing solution file header".to_string(),
            });
        }

        for (project, deps) in projects.iter_mut().zip(pending) {
            for guid in deps {
                match guids.get(&guid) {
                    Some(dep) => project.dependencies.push(dep.clone()),
                    None => log::warn!("{}: unknown project dependency {}", path.display(), guid),
                }
            }
        }

        Ok(Self {
            path: path.to_path_buf(),
            projects,
        })
    }

    /// XML format
    pub fn parse_slnx(path: &Path, text: &str) -> Result<Self, ProcessError> {
        let base = solution_dir(path);
        let malformed = |message: String| ProcessError::MalformedSolution {
            path: path.to_path_buf(),
            message,
        };

        let mut reader = Reader::from_str(text);
        reader.config_mut().trim_text(true);
        let mut buf = Vec::new();
        let mut projects: Vec<SolutionProject> = Vec::new();
        let mut open_project: Option<usize> = None;
        let mut saw_root = false;

        loop {
            buf.clear();
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|e| malformed(format!("{} at byte {}", e, reader.buffer_position())))?;
            let (element, is_start) = match event {
                Event::Start(e) => (e.into_owned(), true),
                Event::Empty(e) => (e.into_owned(), false),
                Event::End(e) => {
                    if e.local_name().as_ref() == b"Project" {
                        open_project = None;
                    }
                    continue;
                }
                Event::Eof => break,
                _ => continue,
            };

            let attr = |key: &[u8]| {
                element
                    .attributes()
                    .flatten()
                    .find(|a| a.key.local_name().as_ref() == key)
                    .and_then(|a| a.unescape_value().ok().map(|v| v.replace('\\', "/")))
            };
            match element.local_name().as_ref() {
                b"Solution" => saw_root = true,
                b"Project" => {
                    let Some(relative) = attr(b"Path") else {
                        return Err(malformed("<Project> without Path".to_string()));
                    };
                    if !is_csharp_project(&relative) {
                        continue;
                    }
                    let project_path = normalize(&base.join(&relative));
                    let name = project_path
                        .file_stem()
                        .map(|s| s.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    projects.push(SolutionProject {
                        name,
                        path: project_path,
                        dependencies: Vec::new(),
                    });
                    if is_start {
                        open_project = Some(projects.len() - 1);
                    }
                }
                b"BuildDependency" => {
                    if let (Some(index), Some(dep)) = (open_project, attr(b"Project")) {
                        projects[index].dependencies.push(normalize(&base.join(dep)));
                    }
                }
                _ => {}
            }
        }

        if !saw_root {
            return Err(malformed("missing <Solution> root".to_string()));
        }
        Ok(Self {
            path: path.to_path_buf(),
            projects,
        })
    }

    /// Project indices in build order. `references[i]` are the descriptors
    /// project `i` references; edges to projects outside the solution are
    /// ignored. Ties keep declaration order.
    pub fn build_order(&self, references: &[Vec<PathBuf>]) -> Result<Vec<usize>, ProcessError> {
        let index: HashMap<&Path, usize> = self
            .projects
            .iter()
            .enumerate()
            .map(|(i, p)| (p.path.as_path(), i))
            .collect();

        let count = self.projects.len();
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); count];
        let mut in_degree = vec![0usize; count];
        for (i, project) in self.projects.iter().enumerate() {
            let mut deps: Vec<usize> = project
                .dependencies
                .iter()
                .chain(references.get(i).into_iter().flatten())
                .filter_map(|p| index.get(p.as_path()).copied())
                .filter(|&d| d != i)
                .collect();
            deps.sort_unstable();
            deps.dedup();
            for dep in deps {
                dependents[dep].push(i);
                in_degree[i] += 1;
            }
        }

        topological_order(&dependents, in_degree).map_err(|stuck| {
            let names: Vec<&str> = stuck.iter().map(|&i| self.projects[i].name.as_str()).collect();
            ProcessError::DependencyCycle(names.join(", "))
        })
    }
}

/// Kahn's algorithm, always taking the lowest ready index. On a cycle the
/// nodes that could not be ordered are returned as the error.
pub fn topological_order(dependents: &[Vec<usize>], mut in_degree: Vec<usize>) -> Result<Vec<usize>, Vec<usize>> {
    let mut ready: BTreeSet<usize> = (0..in_degree.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(in_degree.len());

    while let Some(next) = ready.pop_first() {
        order.push(next);
        for &dependent in &dependents[next] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                ready.insert(dependent);
            }
        }
    }

    if order.len() == in_degree.len() {
        Ok(order)
    } else {
        Err((0..in_degree.len()).filter(|&i| in_degree[i] > 0).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SLN: &str = r#"
Microsoft Visual Studio Solution File, Format Version 12.00
# Visual Studio Version 17
Project("{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}") = "App", "src\App\App.csproj", "{11111111-1111-1111-1111-111111111111}"
	ProjectSection(ProjectDependencies) = postProject
		{33333333-3333-3333-3333-333333333333} = {33333333-3333-3333-3333-333333333333}
	EndProjectSection
EndProject
Project("{2150E333-8FDC-42A3-9474-1A3956D46DE8}") = "Docs", "Docs", "{22222222-2222-2222-2222-222222222222}"
EndProject
Project("{9A19103F-16F7-4668-BE54-9A1E7A4F7556}") = "Lib", "src\Lib\Lib.csproj", "{33333333-3333-3333-3333-333333333333}"
EndProject
Global
EndGlobal
"#;

    #[test]
    fn test_parse_sln() {
        let solution = Solution::parse_sln(Path::new("work/All.sln"), SLN).unwrap();
        let names: Vec<_> = solution.projects.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["App", "Lib"]);
        assert_eq!(solution.projects[0].path, PathBuf::from("work/src/App/App.csproj"));
        assert_eq!(
            solution.projects[0].dependencies,
            vec![PathBuf::from("work/src/Lib/Lib.csproj")]
        );
        assert_eq!(solution.build_order(&[]).unwrap(), vec![1, 0]);
    }

    #[test]
    fn test_parse_sln_requires_header() {
        let err = Solution::parse_sln(Path::new("x.sln"), "not a solution").unwrap_err();
        assert!(matches!(err, ProcessError::MalformedSolution { .. }));
    }

    #[test]
    fn test_parse_slnx() {
        let text = r#"<Solution>
  <Folder Name="/src/">
    <Project Path="src/App/App.csproj">
      <BuildDependency Project="src/Core/Core.csproj" />
    </Project>
    <Project Path="src/Core/Core.csproj" />
    <Project Path="tools/Build.vbproj" />
  </Folder>
</Solution>"#;
        let solution = Solution::parse_slnx(Path::new("All.slnx"), text).unwrap();
        let names: Vec<_> = solution.projects.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["App", "Core"]);
        assert_eq!(solution.projects[0].dependencies, vec![PathBuf::from("src/Core/Core.csproj")]);
        assert_eq!(solution.build_order(&[]).unwrap(), vec![1, 0]);
    }

    #[test]
    fn test_build_order_uses_references() {
        let solution = Solution {
            path: PathBuf::from("s.sln"),
            projects: ["A", "B", "C"]
                .iter()
                .map(|n| SolutionProject {
                    name: n.to_string(),
                    path: PathBuf::from(format!("{}.csproj", n)),
                    dependencies: Vec::new(),
                })
                .collect(),
        };
        // A -> C, B -> A, plus a reference outside the solution
        let references = vec![
            vec![PathBuf::from("C.csproj"), PathBuf::from("External.csproj")],
            vec![PathBuf::from("A.csproj")],
            vec![],
        ];
        assert_eq!(solution.build_order(&references).unwrap(), vec![2, 0, 1]);
    }

    #[test]
    fn test_cycle_is_reported() {
        let solution = Solution {
            path: PathBuf::from("s.sln"),
            projects: vec![
                SolutionProject {
                    name: "A".to_string(),
                    path: PathBuf::from("A.csproj"),
                    dependencies: vec![PathBuf::from("B.csproj")],
                },
                SolutionProject {
                    name: "B".to_string(),
                    path: PathBuf::from("B.csproj"),
                    dependencies: vec![PathBuf::from("A.csproj")],
                },
                SolutionProject {
                    name: "C".to_string(),
                    path: PathBuf::from("C.csproj"),
                    dependencies: Vec::new(),
                },
            ],
        };
        match solution.build_order(&[]) {
            Err(ProcessError::DependencyCycle(names)) => assert_eq!(names, "A, B"),
            other => panic!("expected a cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_topological_order_ties_keep_declaration_order() {
        let dependents = vec![vec![], vec![], vec![0]];
        assert_eq!(topological_order(&dependents, vec![1, 0, 0]), Ok(vec![1, 2, 0]));
    }
}
