//! Toolchain registry: which commands compile and run each supported language.
//!
//! The registry is the only place that knows about per-language differences.
//! Both the batch executor and interactive sessions resolve a user-supplied
//! identifier here first, so an unknown language is rejected before any
//! directory is created or process spawned.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use which::which;

use crate::config::ToolchainOverride;
use crate::errors::{ConfigError, ExecutionError};

/// Stem of the source file written into every workspace.
///
/// Fixed so compiler diagnostics reference a stable path and so Java's
/// public-class-matches-file-name rule resolves to `Main`.
pub const SOURCE_STEM: &str = "Main";

/// File name of the compiled artifact inside the workspace.
pub const ARTIFACT_NAME: &str = "a.out";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Go,
    #[serde(rename = "javascript")]
    JavaScript,
    Java,
    C,
    #[serde(rename = "c++")]
    Cpp,
}

impl Language {
    pub const ALL: [Language; 6] = [
        Language::Python,
        Language::Go,
        Language::JavaScript,
        Language::Java,
        Language::C,
        Language::Cpp,
    ];

    pub fn canonical(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Go => "go",
            Language::JavaScript => "javascript",
            Language::Java => "java",
            Language::C => "c",
            Language::Cpp => "c++",
        }
    }

    /// Every identifier (lowercase) that resolves to this language.
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Language::Python => &["python", "py", "python3"],
            Language::Go => &["go", "golang"],
            Language::JavaScript => &["javascript", "js", "node", "nodejs"],
            Language::Java => &["java"],
            Language::C => &["c"],
            Language::Cpp => &["c++", "cpp", "cxx"],
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Language::Python => "py",
            Language::Go => "go",
            Language::JavaScript => "js",
            Language::Java => "java",
            Language::C => "c",
            Language::Cpp => "cpp",
        }
    }

    /// Case- and whitespace-insensitive alias lookup.
    pub fn from_identifier(identifier: &str) -> Option<Self> {
        let normalized = identifier.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|lang| lang.aliases().contains(&normalized.as_str()))
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical())
    }
}

/// How text submitted to a running program's stdin is framed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    /// Programs read line by line; each submission is terminated with `\n`.
    Line,
    /// Submissions are written exactly as received.
    Raw,
}

impl InputMode {
    pub fn frame(&self, text: &str) -> String {
        match self {
            InputMode::Line if !text.ends_with('\n') => format!("{}\n", text),
            _ => text.to_string(),
        }
    }
}

/// A program plus arguments that may reference `{dir}`, `{source}` and
/// `{artifact}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandTemplate {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandTemplate {
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    pub fn render(&self, paths: &PipelinePaths) -> ResolvedCommand {
        ResolvedCommand {
            program: paths.substitute(&self.program),
            args: self.args.iter().map(|a| paths.substitute(a)).collect(),
        }
    }
}

/// Concrete paths for one workspace, used to fill command templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelinePaths {
    pub dir: PathBuf,
    pub source: PathBuf,
    pub artifact: PathBuf,
}

impl PipelinePaths {
    fn substitute(&self, template: &str) -> String {
        template
            .replace("{dir}", &self.dir.to_string_lossy())
            .replace("{source}", &self.source.to_string_lossy())
            .replace("{artifact}", &self.artifact.to_string_lossy())
    }
}

/// A fully rendered command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl fmt::Display for ResolvedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguagePipeline {
    pub language: Language,
    pub source_file: String,
    pub compile: Option<CommandTemplate>,
    pub run: CommandTemplate,
    pub input_mode: InputMode,
}

impl LanguagePipeline {
    fn builtin(language: Language) -> Self {
        let (compile, run) = match language {
            Language::Python => (None, CommandTemplate::new("python3", &["-u", "{source}"])),
            Language::Go => (None, CommandTemplate::new("go", &["run", "{source}"])),
            Language::JavaScript => (None, CommandTemplate::new("node", &["{source}"])),
            Language::Java => (
                Some(CommandTemplate::new("javac", &["{source}"])),
                CommandTemplate::new("java", &["-cp", "{dir}", SOURCE_STEM]),
            ),
            Language::C => (
                Some(CommandTemplate::new("gcc", &["{source}", "-o", "{artifact}"])),
                CommandTemplate::new("{artifact}", &[]),
            ),
            Language::Cpp => (
                Some(CommandTemplate::new("g++", &["{source}", "-o", "{artifact}"])),
                CommandTemplate::new("{artifact}", &[]),
            ),
        };

        Self {
            language,
            source_file: format!("{}.{}", SOURCE_STEM, language.extension()),
            compile,
            run,
            input_mode: InputMode::Line,
        }
    }

    pub fn canonical(&self) -> &'static str {
        self.language.canonical()
    }

    pub fn needs_compile(&self) -> bool {
        self.compile.is_some()
    }

    pub fn paths(&self, dir: &Path) -> PipelinePaths {
        PipelinePaths {
            dir: dir.to_path_buf(),
            source: dir.join(&self.source_file),
            artifact: dir.join(ARTIFACT_NAME),
        }
    }

    /// The first external program this pipeline invokes.
    pub fn entry_program(&self) -> &str {
        match &self.compile {
            Some(compile) => &compile.program,
            None => &self.run.program,
        }
    }
}

/// Availability of one pipeline's toolchain on this host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolchainStatus {
    pub language: Language,
    pub program: String,
    pub available: bool,
}

#[derive(Debug, Clone)]
pub struct ToolchainRegistry {
    pipelines: HashMap<Language, LanguagePipeline>,
}

impl Default for ToolchainRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolchainRegistry {
    /// Registry with the built-in pipelines for all six languages.
    pub fn new() -> Self {
        let pipelines = Language::ALL
            .into_iter()
            .map(|lang| (lang, LanguagePipeline::builtin(lang)))
            .collect();
        Self { pipelines }
    }

    /// Built-in pipelines with configured command overrides applied.
    ///
    /// Override keys go through the same alias resolution as run requests.
    pub fn with_overrides(
        overrides: &HashMap<String, ToolchainOverride>,
    ) -> Result<Self, ConfigError> {
        let mut registry = Self::new();
        for (key, override_) in overrides {
            let language = Language::from_identifier(key).ok_or_else(|| {
                ConfigError::Invalid(format!("Toolchain override for unknown language '{}'", key))
            })?;
            let Some(pipeline) = registry.pipelines.get_mut(&language) else {
                continue;
            };
            if let Some(compile) = &override_.compile {
                pipeline.compile = Some(compile.clone());
            }
            if let Some(run) = &override_.run {
                pipeline.run = run.clone();
            }
            log::debug!("Applied toolchain override for {}", language);
        }
        Ok(registry)
    }

    pub fn resolve(&self, identifier: &str) -> Result<&LanguagePipeline, ExecutionError> {
        Language::from_identifier(identifier)
            .and_then(|lang| self.pipelines.get(&lang))
            .ok_or_else(|| ExecutionError::UnsupportedLanguage(identifier.trim().to_string()))
    }

    /// Pipelines in a stable order.
    pub fn pipelines(&self) -> impl Iterator<Item = &LanguagePipeline> {
        Language::ALL
            .iter()
            .filter_map(move |lang| self.pipelines.get(lang))
    }

    /// Look up each pipeline's entry program on `PATH`.
    pub fn availability(&self) -> Vec<ToolchainStatus> {
        self.pipelines()
            .map(|pipeline| {
                let program = pipeline.entry_program().to_string();
                // Templated programs such as `{artifact}` only exist after a compile.
                let available = !program.contains('{') && which(&program).is_ok();
                ToolchainStatus {
                    language: pipeline.language,
                    program,
                    available,
                }
            })
            .collect()
    }
}
