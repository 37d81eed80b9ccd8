use grep::regex::RegexMatcher;
use grep::searcher::{Searcher, Sink, SinkMatch};
use std::error::Error;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

// Directories holding this crate's own sources. Everything else in the
// working tree is ignored by the scans below.
const SOURCE_ROOTS: [&str; 3] = ["gate", "cli", "tests"];

// Which lines a collector keeps after the regex has matched.
#[derive(Clone, Copy)]
enum LineFilter {
    // Drop matches that sit inside comments or string literals.
    CodeOnly,
    // Keep only matches that sit inside comments.
    CommentsOnly,
    // Keep every match.
    Everything,
}

// A custom "Sink" for the grep searcher. It collects all matching lines
// from a single file to build a comprehensive error message.
struct ViolationCollector {
    violations: Vec<String>,
    file_path: PathBuf,
    filter: LineFilter,
}

impl ViolationCollector {
    fn new(file_path: &Path, filter: LineFilter) -> Self {
        Self {
            violations: Vec::new(),
            file_path: file_path.to_path_buf(),
            filter,
        }
    }

    // After searching, this method checks if any violations were found.
    // If so, it formats a detailed error message and returns it.
    fn check_and_get_error_message(&self, rule: &Rule) -> Option<String> {
        if self.violations.is_empty() {
            return None;
        }

        let file_name = self.file_path.to_str().unwrap_or("?");
        let mut error_msg = format!(
            "\n❌ ERROR: Found {} {} in {}:\n",
            self.violations.len(),
            rule.description,
            file_name
        );

        for violation in &self.violations {
            error_msg.push_str(&format!("   {violation}\n"));
        }

        error_msg.push_str(&format!("\n⚠️ {}\n", rule.advice));
        Some(error_msg)
    }
}

fn is_comment(line_text: &str) -> bool {
    let trimmed = line_text.trim_start();
    trimmed.starts_with("//") || trimmed.starts_with("/*") || trimmed.starts_with('*')
}

fn is_in_string(line_text: &str) -> bool {
    // Odd-numbered segments between double quotes are string contents.
    line_text
        .split('"')
        .enumerate()
        .any(|(i, part)| i % 2 == 1 && part.contains('_'))
}

impl Sink for ViolationCollector {
    type Error = std::io::Error;

    fn matched(&mut self, _: &Searcher, mat: &SinkMatch) -> Result<bool, Self::Error> {
        let line_number = mat.line_number().unwrap_or(0);
        let line_text = std::str::from_utf8(mat.bytes()).unwrap_or("").trim_end();

        let keep = match self.filter {
            LineFilter::CodeOnly => !is_comment(line_text) && !is_in_string(line_text),
            LineFilter::CommentsOnly => line_text.contains("//") || line_text.contains("/*"),
            LineFilter::Everything => true,
        };

        if keep {
            // Format the violation string exactly as the `rg -n` command would.
            self.violations.push(format!("{line_number}:{line_text}"));
        }

        // Return `Ok(true)` to continue searching for more matches in the same file.
        Ok(true)
    }
}

struct Rule {
    pattern: &'static str,
    filter: LineFilter,
    description: &'static str,
    advice: &'static str,
}

const RULES: [Rule; 3] = [
    Rule {
        pattern: r"\b(_[a-zA-Z0-9_]+)\b",
        filter: LineFilter::CodeOnly,
        description: "underscore-prefixed variables",
        advice: "Underscore-prefixed variable names are not allowed in this project. \
                 Either use the variable (removing the underscore) or remove it completely.",
    },
    Rule {
        pattern: r"(//|/\*).*\b(?:FIXED|CORRECTED|FIX|FIXES|CHANGED|CHANGES|MODIFIED|UPDATED)\b",
        filter: LineFilter::CommentsOnly,
        description: "forbidden comment patterns",
        advice: "Comments narrating edits are not allowed. Describe what the code does, \
                 or remove the comment completely.",
    },
    Rule {
        pattern: r"#\s*\[\s*allow\s*\(\s*dead_code\s*\)\s*\]",
        filter: LineFilter::Everything,
        description: "#[allow(dead_code)] attributes",
        advice: "#[allow(dead_code)] attributes are not allowed in this project. \
                 Either use the code (removing the attribute) or remove it completely.",
    },
];

fn main() {
    // Always rerun this script if the build script itself changes.
    println!("cargo:rerun-if-changed=build.rs");
    for root in SOURCE_ROOTS {
        println!("cargo:rerun-if-changed={root}");
    }

    for rule in &RULES {
        if let Err(e) = scan(rule) {
            // The `eprintln!` here is crucial for showing the error in `cargo`'s output.
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}

fn scan(rule: &Rule) -> Result<(), Box<dyn Error>> {
    let matcher = RegexMatcher::new_line_matcher(rule.pattern)?;
    let mut searcher = Searcher::new();

    for root in SOURCE_ROOTS {
        for entry in WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok()) // Ignore any errors during directory traversal.
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "rs"))
        {
            let path = entry.path();
            let mut collector = ViolationCollector::new(path, rule.filter);
            searcher.search_path(&matcher, path, &mut collector)?;

            if let Some(error_message) = collector.check_and_get_error_message(rule) {
                return Err(error_message.into());
            }
        }
    }

    Ok(())
}
