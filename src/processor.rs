//! File, project and solution processing
//!
//! Every level conjoins the verdicts of its children without stopping at
//! the first failure, so one run reports everything. Only a bad root target
//! (and a dependency cycle, which leaves no valid order) aborts the run.

use crate::config::{Config, ConfigError};
use crate::csharp::{Compilation, SyntaxTree};
use crate::engine::{Engine, UnitOutcome, Verdict};
use crate::model::SourceUnit;
use crate::output::Reporter;
use crate::project::Project;
use crate::solution::Solution;
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that abort processing
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Bad/empty/unknown source path: {}", .0.display())]
    BadSource(PathBuf),

    #[error("Bad (unknown) target {}", .0.display())]
    BadTarget(PathBuf),

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed project {}: {message}", path.display())]
    MalformedProject { path: PathBuf, message: String },

    #[error("Malformed solution {}: {message}", path.display())]
    MalformedSolution { path: PathBuf, message: String },

    #[error("Project dependency cycle between {0}")]
    DependencyCycle(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// What a run was pointed at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    File(PathBuf),
    Project(PathBuf),
    Solution(PathBuf),
}

impl Target {
    /// Classify a root target by its extension. The target must exist.
    pub fn detect(path: &Path) -> Result<Self, ProcessError> {
        if path.as_os_str().is_empty() || !path.is_file() {
            return Err(ProcessError::BadSource(path.to_path_buf()));
        }
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "cs" => Ok(Target::File(path.to_path_buf())),
            "csproj" => Ok(Target::Project(path.to_path_buf())),
            "sln" | "slnx" => Ok(Target::Solution(path.to_path_buf())),
            _ => Err(ProcessError::BadTarget(path.to_path_buf())),
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Target::File(p) | Target::Project(p) | Target::Solution(p) => p,
        }
    }
}

/// Drives the engine over a target and streams outcomes to a reporter
pub struct Processor<'r> {
    engine: Engine,
    defines: Vec<String>,
    reporter: &'r mut Reporter,
}

impl<'r> Processor<'r> {
    pub fn new(config: &Config, reporter: &'r mut Reporter) -> Self {
        Self::with_engine(Engine::new(config), config.analysis.defines.clone(), reporter)
    }

    pub fn with_engine(engine: Engine, defines: Vec<String>, reporter: &'r mut Reporter) -> Self {
        Self {
            engine,
            defines,
            reporter,
        }
    }

    pub fn process(&mut self, target: &Target) -> Result<Verdict, ProcessError> {
        match target {
            Target::File(path) => self.process_file(path),
            Target::Project(path) => {
                let project = Project::load(path)?;
                Ok(self.process_project(&project))
            }
            Target::Solution(path) => self.process_solution(path),
        }
    }

    /// A lone source file, compiled against the platform catalog only
    pub fn process_file(&mut self, path: &Path) -> Result<Verdict, ProcessError> {
        let unit = SourceUnit::read(path).map_err(|source| ProcessError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let tree = SyntaxTree::parse(&unit.path, unit.text, &self.symbols(&[]));
        let compilation = Compilation::new(vec![tree], Vec::new());
        Ok(self.flush(self.engine.process_compilation(&compilation)))
    }

    /// Every compile item of a loaded project, in item order
    pub fn process_project(&mut self, project: &Project) -> Verdict {
        self.reporter.info(&format!(
            "Processing of the project {} is started",
            project.path.display()
        ));

        let symbols = self.symbols(&project.defines);
        // Unreadable items keep their slot so reporting stays in item order
        let mut slots: Vec<Result<SyntaxTree, UnitOutcome>> = Vec::with_capacity(project.sources.len());
        for path in &project.sources {
            slots.push(match SourceUnit::read(path) {
                Ok(unit) => Ok(SyntaxTree::parse(&unit.path, unit.text, &symbols)),
                Err(err) => {
                    log::debug!("{}: {}", path.display(), err);
                    Err(UnitOutcome::unreadable(path, &err))
                }
            });
        }

        let mut trees = Vec::new();
        let mut unreadable = Vec::new();
        for (index, slot) in slots.into_iter().enumerate() {
            match slot {
                Ok(tree) => trees.push(tree),
                Err(outcome) => unreadable.push((index, outcome)),
            }
        }

        let compilation = Compilation::new(trees, self.reference_trees(project));
        let mut outcomes = self.engine.process_compilation(&compilation);
        for (index, outcome) in unreadable {
            outcomes.insert(index, outcome);
        }
        let verdict = self.flush(outcomes);

        self.reporter.info(&format!(
            "Processing of the project {} is finished",
            project.path.display()
        ));
        verdict
    }

    /// Every project of a solution in build order
    pub fn process_solution(&mut self, path: &Path) -> Result<Verdict, ProcessError> {
        let solution = Solution::load(path)?;
        let projects: Vec<Result<Project, ProcessError>> = solution
            .projects
            .iter()
            .map(|p| Project::load(&p.path))
            .collect();
        let references: Vec<Vec<PathBuf>> = projects
            .iter()
            .map(|p| p.as_ref().map(|p| p.references.clone()).unwrap_or_default())
            .collect();
        let order = solution.build_order(&references)?;

        self.reporter.info(&format!(
            "Processing of the solution {} is started",
            path.display()
        ));
        let mut verdict = Verdict::PASS;
        for index in order {
            verdict &= match &projects[index] {
                Ok(project) => self.process_project(project),
                Err(err) => {
                    log::warn!("{}", err);
                    self.reporter.failure(&format!(
                        "Bad (unknown) target {}",
                        solution.projects[index].path.display()
                    ));
                    Verdict::FAIL
                }
            };
        }
        self.reporter.info(&format!(
            "Processing of the solution {} is finished",
            path.display()
        ));
        Ok(verdict)
    }

    fn symbols(&self, extra: &[String]) -> HashSet<String> {
        self.defines.iter().chain(extra).cloned().collect()
    }

    /// Sources of every project reachable through references, one group per
    /// project. Broken references are skipped; the compile gate reports
    /// whatever then fails to resolve.
    fn reference_trees(&self, project: &Project) -> Vec<Vec<SyntaxTree>> {
        let mut groups = Vec::new();
        let mut seen: HashSet<PathBuf> = HashSet::from([project.path.clone()]);
        let mut queue: VecDeque<PathBuf> = project.references.iter().cloned().collect();

        while let Some(path) = queue.pop_front() {
            if !seen.insert(path.clone()) {
                continue;
            }
            let referenced = match Project::load(&path) {
                Ok(referenced) => referenced,
                Err(err) => {
                    log::warn!("{}: skipping reference: {}", project.path.display(), err);
                    continue;
                }
            };
            let symbols = self.symbols(&referenced.defines);
            let trees = referenced
                .sources
                .iter()
                .filter_map(|source| match SourceUnit::read(source) {
                    Ok(unit) => Some(SyntaxTree::parse(&unit.path, unit.text, &symbols)),
                    Err(err) => {
                        log::warn!("{}: skipping referenced source: {}", source.display(), err);
                        None
                    }
                })
                .collect();
            groups.push(trees);
            queue.extend(referenced.references);
        }
        groups
    }

    fn flush(&mut self, outcomes: Vec<UnitOutcome>) -> Verdict {
        let mut verdict = Verdict::PASS;
        for outcome in &outcomes {
            self.reporter.unit(outcome);
            verdict &= outcome.verdict;
        }
        verdict
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OutputFormat, OutputLevel};
    use crate::output::testing::reporter;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &Path, relative: &str, text: &str) -> PathBuf {
        let path = dir.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn test_detect_target() {
        let dir = TempDir::new().unwrap();
        let file = write(dir.path(), "A.cs", "class A {}");
        let project = write(dir.path(), "A.csproj", "<Project />");
        let solution = write(dir.path(), "A.SLN", "");
        let other = write(dir.path(), "notes.txt", "");

        assert_eq!(Target::detect(&file).unwrap(), Target::File(file.clone()));
        assert_eq!(Target::detect(&project).unwrap(), Target::Project(project.clone()));
        assert_eq!(Target::detect(&solution).unwrap(), Target::Solution(solution.clone()));
        assert!(matches!(Target::detect(&other), Err(ProcessError::BadTarget(_))));
        assert!(matches!(
            Target::detect(&dir.path().join("missing.cs")),
            Err(ProcessError::BadSource(_))
        ));
        assert!(matches!(Target::detect(dir.path()), Err(ProcessError::BadSource(_))));
    }

    #[test]
    fn test_file_defines_from_config() {
        let dir = TempDir::new().unwrap();
        let path = write(dir.path(), "A.cs", "#if PORTED\nclass Ä {}\n#endif\nclass B {}\n");

        let (mut rep, _, _) = reporter(OutputLevel::Error, OutputFormat::Text);
        let mut config = Config::default();
        let verdict = Processor::new(&config, &mut rep).process(&Target::File(path.clone())).unwrap();
        assert!(verdict.is_pass());

        config.analysis.defines = vec!["PORTED".to_string()];
        let (mut rep, out, _) = reporter(OutputLevel::Error, OutputFormat::Text);
        let verdict = Processor::new(&config, &mut rep).process(&Target::File(path)).unwrap();
        assert!(!verdict.is_pass());
        assert!(out.contents().contains("Found non-ASCII identifier \"Ä\""));
    }

    #[test]
    fn test_project_continues_past_failures() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "A.cs", "class Ñ {}");
        write(dir.path(), "B.cs", "class B : Missing {}");
        write(dir.path(), "C.cs", "class Ç {}");
        let path = write(
            dir.path(),
            "P.csproj",
            r#"<Project><ItemGroup>
                 <Compile Include="A.cs" />
                 <Compile Include="Gone.cs" />
                 <Compile Include="B.cs" />
                 <Compile Include="C.cs" />
               </ItemGroup></Project>"#,
        );

        let (mut rep, out, _) = reporter(OutputLevel::Error, OutputFormat::Text);
        let verdict = Processor::new(&Config::default(), &mut rep)
            .process(&Target::Project(path))
            .unwrap();
        assert!(!verdict.is_pass());

        let units: Vec<String> = rep
            .report()
            .units
            .iter()
            .map(|u| u.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(units, vec!["A.cs", "Gone.cs", "B.cs", "C.cs"]);
        let text = out.contents();
        assert!(text.contains("\"Ñ\""));
        assert!(text.contains("\"Ç\""));
        assert!(text.contains("CS0246"));
        assert!(text.contains("Bad (unknown) target"));
    }

    #[test]
    fn test_project_reference_resolves_types() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "Lib/Shapes.cs", "namespace Lib { public interface IShape {} public interface INamed {} }");
        write(dir.path(), "Lib/Lib.csproj", r#"<Project Sdk="Microsoft.NET.Sdk" />"#);
        write(dir.path(), "App/Circle.cs", "using Lib; class Circle : IShape, INamed {}");
        let app = write(
            dir.path(),
            "App/App.csproj",
            r#"<Project Sdk="Microsoft.NET.Sdk">
                 <ItemGroup><ProjectReference Include="..\Lib\Lib.csproj" /></ItemGroup>
               </Project>"#,
        );

        let (mut rep, out, _) = reporter(OutputLevel::Error, OutputFormat::Text);
        let verdict = Processor::new(&Config::default(), &mut rep)
            .process(&Target::Project(app))
            .unwrap();
        assert!(!verdict.is_pass());
        let text = out.contents();
        assert!(text.contains("Lib.IShape"), "{}", text);
        assert!(text.contains("Lib.INamed"), "{}", text);
        assert!(!text.contains("CS0246"), "{}", text);
        // Referenced sources are not analyzed themselves
        assert_eq!(rep.report().units.len(), 1);
    }

    #[test]
    fn test_missing_root_project_is_fatal() {
        let dir = TempDir::new().unwrap();
        let (mut rep, out, _) = reporter(OutputLevel::Info, OutputFormat::Text);
        let err = Processor::new(&Config::default(), &mut rep)
            .process(&Target::Project(dir.path().join("Nope.csproj")))
            .unwrap_err();
        assert!(matches!(err, ProcessError::Io { .. }));
        assert_eq!(out.contents(), "");
    }

    #[test]
    fn test_solution_order_and_missing_member() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "Core/Core.cs", "namespace Core { public interface IA {} }");
        write(dir.path(), "Core/Core.csproj", r#"<Project Sdk="Microsoft.NET.Sdk" />"#);
        write(dir.path(), "App/App.cs", "class App : Core.IA {}");
        write(
            dir.path(),
            "App/App.csproj",
            r#"<Project Sdk="Microsoft.NET.Sdk">
                 <ItemGroup><ProjectReference Include="../Core/Core.csproj" /></ItemGroup>
               </Project>"#,
        );
        let sln = write(
            dir.path(),
            "All.slnx",
            r#"<Solution>
                 <Project Path="App/App.csproj" />
                 <Project Path="Ghost/Ghost.csproj" />
                 <Project Path="Core/Core.csproj" />
               </Solution>"#,
        );

        let (mut rep, out, _) = reporter(OutputLevel::Info, OutputFormat::Text);
        let verdict = Processor::new(&Config::default(), &mut rep)
            .process(&Target::Solution(sln))
            .unwrap();
        assert!(!verdict.is_pass());

        let text = out.contents();
        let started: Vec<&str> = text
            .lines()
            .filter(|l| l.starts_with("[INFO]: Processing of the project") && l.ends_with("started"))
            .collect();
        assert_eq!(started.len(), 2);
        assert!(started[0].contains("Core.csproj"));
        assert!(started[1].contains("App.csproj"));
        assert!(text.contains("[ERROR]: Bad (unknown) target"));
        assert!(text.contains("Ghost.csproj"));
        let finished = text.lines().rev().find(|l| l.starts_with("[INFO]")).unwrap();
        assert!(finished.contains("Processing of the solution"));
        assert_eq!(rep.report().units.iter().filter(|u| u.verdict.is_pass()).count(), 2);
    }
}
