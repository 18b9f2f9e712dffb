//! Rule-based commit classifier.
//!
//! Assigns exactly one [`EventType`] to a commit from its file list,
//! aggregate line counts, and message. Rules are kept in the ordered
//! [`RULES`] table and evaluated top to bottom; the first rule whose
//! predicate holds wins. [`DEFAULT_RULE`] closes the table so
//! classification is total.
//!
//! | # | Rule | Event |
//! |---|------|-------|
//! | 1 | any dependency manifest | `dependency_update` |
//! | 2 | >1 top-level dir and >3 new files | `new_module` |
//! | 3 | config file and ≤3 files | `config_change` |
//! | 4 | README/Markdown and ≤2 files | `documentation` |
//! | 5 | path contains `test` or `spec` | `testing` |
//! | 6 | deletions > additions and > 200 | `refactor` |
//! | 7 | additions > 300 | `major_feature` |
//! | 8 | any new file | `files_added` |
//! | 9 | any deleted file | `cleanup` |
//! | 10 | message mentions fix/bug/patch | `bug_fix` |
//! | 11 | message mentions feat/feature/add | `feature` |
//! | 12 | ≤2 files and additions < 50 | `minor_update` |
//! | 13 | otherwise | `major_update` |

use std::collections::{BTreeMap, BTreeSet};

use crate::host::CommitStats;
use crate::models::{Event, EventType, FileDiff, FileStatus};

const DEPENDENCY_FILES: &[&str] = &[
    "package.json",
    "requirements.txt",
    "pom.xml",
    "build.gradle",
    "gemfile",
    "cargo.toml",
    "go.mod",
    "composer.json",
    "package-lock.json",
    "yarn.lock",
];

const CONFIG_FILES: &[&str] = &[
    ".env",
    "config.json",
    "config.yaml",
    "settings.py",
    "webpack.config.js",
    "tsconfig.json",
    ".gitignore",
];

const BUG_FIX_KEYWORDS: &[&str] = &["fix", "bug", "patch"];
const FEATURE_KEYWORDS: &[&str] = &["feat", "feature", "add"];

/// Files whose `changes` count exceeds this are counted as large.
const LARGE_CHANGE_LINES: u64 = 100;

/// Per-file facts gathered once and shared by every rule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileAnalysis {
    pub new_files: usize,
    pub deleted_files: usize,
    pub modified_files: usize,
    pub extensions: BTreeMap<String, usize>,
    /// First path segment of every nested file. Root-level files add nothing.
    pub directories: BTreeSet<String>,
    pub has_dependencies: bool,
    pub has_config: bool,
    pub has_docs: bool,
    pub has_tests: bool,
    pub large_changes: usize,
}

impl FileAnalysis {
    pub fn from_files(files: &[FileDiff]) -> Self {
        let mut analysis = Self::default();

        for file in files {
            let filename = file.filename.as_str();
            let lower = filename.to_lowercase();

            match file.status {
                FileStatus::Added => analysis.new_files += 1,
                FileStatus::Removed => analysis.deleted_files += 1,
                FileStatus::Modified | FileStatus::Renamed => analysis.modified_files += 1,
            }

            if let Some((_, ext)) = filename.rsplit_once('.') {
                *analysis.extensions.entry(ext.to_string()).or_insert(0) += 1;
            }

            if let Some((dir, _)) = filename.split_once('/') {
                analysis.directories.insert(dir.to_string());
            }

            if DEPENDENCY_FILES.iter().any(|dep| lower.contains(dep)) {
                analysis.has_dependencies = true;
            }
            if CONFIG_FILES.iter().any(|cfg| lower.contains(cfg)) {
                analysis.has_config = true;
            }
            if lower.contains("readme") || filename.ends_with(".md") {
                analysis.has_docs = true;
            }
            if lower.contains("test") || lower.contains("spec") {
                analysis.has_tests = true;
            }
            if file.changes > LARGE_CHANGE_LINES {
                analysis.large_changes += 1;
            }
        }

        analysis
    }
}

/// Everything a rule may look at.
#[derive(Debug, Clone)]
pub struct ClassifyInput {
    pub analysis: FileAnalysis,
    pub files_changed: usize,
    pub additions: u64,
    pub deletions: u64,
    message_lower: String,
}

impl ClassifyInput {
    pub fn new(files: &[FileDiff], stats: CommitStats, message: &str) -> Self {
        Self {
            analysis: FileAnalysis::from_files(files),
            files_changed: files.len(),
            additions: stats.additions,
            deletions: stats.deletions,
            message_lower: message.to_lowercase(),
        }
    }

    fn message_mentions(&self, keywords: &[&str]) -> bool {
        keywords.iter().any(|k| self.message_lower.contains(k))
    }
}

/// One entry of the ordered rule table.
pub struct Rule {
    pub event_type: EventType,
    pub applies: fn(&ClassifyInput) -> bool,
    pub describe: fn(&ClassifyInput) -> String,
}

impl Rule {
    fn event(&self, input: &ClassifyInput) -> Event {
        Event {
            event_type: self.event_type,
            description: (self.describe)(input),
            files_changed: input.files_changed,
            total_additions: input.additions,
            total_deletions: input.deletions,
        }
    }
}

/// Classification rules in priority order.
pub static RULES: &[Rule] = &[
    Rule {
        event_type: EventType::DependencyUpdate,
        applies: touches_dependencies,
        describe: describe_dependency_update,
    },
    Rule {
        event_type: EventType::NewModule,
        applies: adds_module,
        describe: describe_new_module,
    },
    Rule {
        event_type: EventType::ConfigChange,
        applies: is_config_change,
        describe: describe_config_change,
    },
    Rule {
        event_type: EventType::Documentation,
        applies: is_documentation,
        describe: describe_documentation,
    },
    Rule {
        event_type: EventType::Testing,
        applies: touches_tests,
        describe: describe_testing,
    },
    Rule {
        event_type: EventType::Refactor,
        applies: is_refactor,
        describe: describe_refactor,
    },
    Rule {
        event_type: EventType::MajorFeature,
        applies: is_major_feature,
        describe: describe_major_feature,
    },
    Rule {
        event_type: EventType::FilesAdded,
        applies: adds_files,
        describe: describe_files_added,
    },
    Rule {
        event_type: EventType::Cleanup,
        applies: deletes_files,
        describe: describe_cleanup,
    },
    Rule {
        event_type: EventType::BugFix,
        applies: mentions_bug_fix,
        describe: describe_bug_fix,
    },
    Rule {
        event_type: EventType::Feature,
        applies: mentions_feature,
        describe: describe_feature,
    },
    Rule {
        event_type: EventType::MinorUpdate,
        applies: is_minor_update,
        describe: describe_minor_update,
    },
];

/// Applied when no rule in [`RULES`] matches.
pub static DEFAULT_RULE: Rule = Rule {
    event_type: EventType::MajorUpdate,
    applies: always,
    describe: describe_major_update,
};

/// Classify a commit. Deterministic for identical inputs.
pub fn classify(files: &[FileDiff], stats: CommitStats, message: &str) -> Event {
    let input = ClassifyInput::new(files, stats, message);
    matching_rule(&input).event(&input)
}

/// Returns the first rule whose predicate holds for `input`.
pub fn matching_rule(input: &ClassifyInput) -> &'static Rule {
    RULES
        .iter()
        .find(|rule| (rule.applies)(input))
        .unwrap_or(&DEFAULT_RULE)
}

fn touches_dependencies(input: &ClassifyInput) -> bool {
    input.analysis.has_dependencies
}

fn adds_module(input: &ClassifyInput) -> bool {
    input.analysis.directories.len() > 1 && input.analysis.new_files > 3
}

fn is_config_change(input: &ClassifyInput) -> bool {
    input.analysis.has_config && input.files_changed <= 3
}

fn is_documentation(input: &ClassifyInput) -> bool {
    input.analysis.has_docs && input.files_changed <= 2
}

fn touches_tests(input: &ClassifyInput) -> bool {
    input.analysis.has_tests
}

fn is_refactor(input: &ClassifyInput) -> bool {
    input.deletions > input.additions && input.deletions > 200
}

fn is_major_feature(input: &ClassifyInput) -> bool {
    input.additions > 300
}

fn adds_files(input: &ClassifyInput) -> bool {
    input.analysis.new_files > 0
}

fn deletes_files(input: &ClassifyInput) -> bool {
    input.analysis.deleted_files > 0
}

fn mentions_bug_fix(input: &ClassifyInput) -> bool {
    input.message_mentions(BUG_FIX_KEYWORDS)
}

fn mentions_feature(input: &ClassifyInput) -> bool {
    input.message_mentions(FEATURE_KEYWORDS)
}

fn is_minor_update(input: &ClassifyInput) -> bool {
    input.files_changed <= 2 && input.additions < 50
}

fn always(_: &ClassifyInput) -> bool {
    true
}

fn describe_dependency_update(input: &ClassifyInput) -> String {
    format!("Dependency update ({} files)", input.files_changed)
}

fn describe_new_module(input: &ClassifyInput) -> String {
    format!("New module added ({} new files)", input.analysis.new_files)
}

fn describe_config_change(_: &ClassifyInput) -> String {
    "Configuration update".to_string()
}

fn describe_documentation(_: &ClassifyInput) -> String {
    "Documentation update".to_string()
}

fn describe_testing(input: &ClassifyInput) -> String {
    format!("Test files updated ({} files)", input.files_changed)
}

fn describe_refactor(input: &ClassifyInput) -> String {
    format!("Code refactoring ({} lines removed)", input.deletions)
}

fn describe_major_feature(input: &ClassifyInput) -> String {
    format!("Major feature update (+{} lines)", input.additions)
}

fn describe_files_added(input: &ClassifyInput) -> String {
    format!("{} new files added", input.analysis.new_files)
}

fn describe_cleanup(input: &ClassifyInput) -> String {
    format!("{} files removed", input.analysis.deleted_files)
}

fn describe_bug_fix(input: &ClassifyInput) -> String {
    format!("Bug fix ({} files)", input.files_changed)
}

fn describe_feature(input: &ClassifyInput) -> String {
    format!("Feature implementation ({} files)", input.files_changed)
}

fn describe_minor_update(input: &ClassifyInput) -> String {
    format!("Minor update ({} files)", input.files_changed)
}

fn describe_major_update(input: &ClassifyInput) -> String {
    format!("Major update ({} files)", input.files_changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StorageType;

    fn file(name: &str, status: FileStatus, changes: u64) -> FileDiff {
        FileDiff {
            filename: name.to_string(),
            previous_filename: None,
            status,
            additions: changes,
            deletions: 0,
            changes,
            patch: String::new(),
            before: None,
            after: None,
            storage: StorageType::PatchOnly,
        }
    }

    fn stats(additions: u64, deletions: u64) -> CommitStats {
        CommitStats {
            additions,
            deletions,
        }
    }

    fn kind(files: &[FileDiff], s: CommitStats, message: &str) -> EventType {
        classify(files, s, message).event_type
    }

    #[test]
    fn test_rule_table_order() {
        let order: Vec<EventType> = RULES.iter().map(|r| r.event_type).collect();
        assert_eq!(
            order,
            vec![
                EventType::DependencyUpdate,
                EventType::NewModule,
                EventType::ConfigChange,
                EventType::Documentation,
                EventType::Testing,
                EventType::Refactor,
                EventType::MajorFeature,
                EventType::FilesAdded,
                EventType::Cleanup,
                EventType::BugFix,
                EventType::Feature,
                EventType::MinorUpdate,
            ]
        );
        assert_eq!(DEFAULT_RULE.event_type, EventType::MajorUpdate);
    }

    #[test]
    fn test_analysis_counts() {
        let files = vec![
            file("src/main.rs", FileStatus::Modified, 150),
            file("src/lib.rs", FileStatus::Added, 10),
            file("docs/README.md", FileStatus::Removed, 5),
            file("Makefile", FileStatus::Renamed, 1),
        ];
        let a = FileAnalysis::from_files(&files);
        assert_eq!(a.new_files, 1);
        assert_eq!(a.deleted_files, 1);
        assert_eq!(a.modified_files, 2);
        assert_eq!(a.extensions.get("rs"), Some(&2));
        assert_eq!(a.extensions.get("md"), Some(&1));
        assert_eq!(a.directories.len(), 2);
        assert!(a.has_docs);
        assert!(!a.has_tests);
        assert_eq!(a.large_changes, 1);
    }

    #[test]
    fn test_dependency_update() {
        let files = vec![file("backend/Cargo.toml", FileStatus::Modified, 2)];
        let event = classify(&files, stats(1, 1), "bump serde");
        assert_eq!(event.event_type, EventType::DependencyUpdate);
        assert_eq!(event.description, "Dependency update (1 files)");
    }

    #[test]
    fn test_dependency_beats_documentation() {
        let files = vec![
            file("requirements.txt", FileStatus::Added, 3),
            file("README.md", FileStatus::Added, 2),
        ];
        assert_eq!(kind(&files, stats(5, 0), "docs"), EventType::DependencyUpdate);
    }

    #[test]
    fn test_new_module() {
        let files = vec![
            file("api/a.rs", FileStatus::Added, 1),
            file("api/b.rs", FileStatus::Added, 1),
            file("web/c.ts", FileStatus::Added, 1),
            file("web/d.ts", FileStatus::Added, 1),
        ];
        let event = classify(&files, stats(4, 0), "");
        assert_eq!(event.event_type, EventType::NewModule);
        assert_eq!(event.description, "New module added (4 new files)");
    }

    #[test]
    fn test_new_module_needs_two_directories() {
        let files = vec![
            file("api/a.rs", FileStatus::Added, 1),
            file("api/b.rs", FileStatus::Added, 1),
            file("api/c.rs", FileStatus::Added, 1),
            file("api/d.rs", FileStatus::Added, 1),
        ];
        assert_eq!(kind(&files, stats(4, 0), ""), EventType::FilesAdded);
    }

    #[test]
    fn test_config_change_limited_to_three_files() {
        let files = vec![file(".gitignore", FileStatus::Modified, 1)];
        assert_eq!(kind(&files, stats(1, 0), ""), EventType::ConfigChange);

        let files = vec![
            file("tsconfig.json", FileStatus::Modified, 1),
            file("src/a.ts", FileStatus::Modified, 1),
            file("src/b.ts", FileStatus::Modified, 1),
            file("src/c.ts", FileStatus::Modified, 1),
        ];
        assert_eq!(kind(&files, stats(4, 0), ""), EventType::MajorUpdate);
    }

    #[test]
    fn test_documentation() {
        let files = vec![file("docs/guide.md", FileStatus::Modified, 4)];
        let event = classify(&files, stats(4, 0), "fix typo");
        assert_eq!(event.event_type, EventType::Documentation);
        assert_eq!(event.description, "Documentation update");
    }

    #[test]
    fn test_testing() {
        let files = vec![
            file("src/parser.rs", FileStatus::Modified, 4),
            file("src/lexer.rs", FileStatus::Modified, 4),
            file("tests/parser_test.rs", FileStatus::Modified, 4),
        ];
        let event = classify(&files, stats(12, 0), "");
        assert_eq!(event.event_type, EventType::Testing);
        assert_eq!(event.description, "Test files updated (3 files)");
    }

    #[test]
    fn test_refactor_and_major_feature() {
        let files = vec![file("src/engine.rs", FileStatus::Modified, 400)];
        let event = classify(&files, stats(50, 350), "");
        assert_eq!(event.event_type, EventType::Refactor);
        assert_eq!(event.description, "Code refactoring (350 lines removed)");

        let event = classify(&files, stats(301, 0), "");
        assert_eq!(event.event_type, EventType::MajorFeature);
        assert_eq!(event.description, "Major feature update (+301 lines)");
    }

    #[test]
    fn test_files_added_before_cleanup() {
        let files = vec![
            file("src/new.rs", FileStatus::Added, 10),
            file("src/old.rs", FileStatus::Removed, 10),
        ];
        assert_eq!(kind(&files, stats(10, 10), "fix"), EventType::FilesAdded);

        let files = vec![file("src/old.rs", FileStatus::Removed, 10)];
        let event = classify(&files, stats(0, 10), "fix");
        assert_eq!(event.event_type, EventType::Cleanup);
        assert_eq!(event.description, "1 files removed");
    }

    #[test]
    fn test_message_rules_case_insensitive() {
        let files = vec![
            file("src/a.rs", FileStatus::Modified, 30),
            file("src/b.rs", FileStatus::Modified, 30),
            file("src/c.rs", FileStatus::Modified, 30),
        ];
        assert_eq!(kind(&files, stats(60, 30), "FIX overflow"), EventType::BugFix);
        assert_eq!(kind(&files, stats(60, 30), "Add caching"), EventType::Feature);
        assert_eq!(kind(&files, stats(60, 30), "tidy"), EventType::MajorUpdate);
    }

    #[test]
    fn test_minor_update() {
        let files = vec![file("src/a.rs", FileStatus::Modified, 3)];
        let event = classify(&files, stats(49, 1), "tweak");
        assert_eq!(event.event_type, EventType::MinorUpdate);
        assert_eq!(event.description, "Minor update (1 files)");

        assert_eq!(kind(&files, stats(50, 1), "tweak"), EventType::MajorUpdate);
    }

    #[test]
    fn test_classification_deterministic() {
        let files = vec![
            file("src/a.rs", FileStatus::Modified, 30),
            file("README.md", FileStatus::Modified, 3),
        ];
        let first = classify(&files, stats(33, 4), "feature: readme");
        let second = classify(&files, stats(33, 4), "feature: readme");
        assert_eq!(first, second);
    }

    #[test]
    fn test_event_carries_totals() {
        let files = vec![file("src/a.rs", FileStatus::Modified, 3)];
        let event = classify(&files, stats(7, 2), "");
        assert_eq!(event.files_changed, 1);
        assert_eq!(event.total_additions, 7);
        assert_eq!(event.total_deletions, 2);
    }
}
