//! Language detection from file extension, with content sniffing for
//! extensions shared by more than one language.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

/// How much of a file is read when sniffing its contents.
const SNIFF_BYTES: u64 = 8 * 1024;

static CPP_MARKERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?m)^\s*(class\s+\w+|namespace\s+\w+|template\s*<)",
        r"|std::|#include\s*<(iostream|string|vector|memory|map)>",
    ))
    .unwrap()
});

static OBJC_MARKERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(@interface|@implementation|@protocol|@end\b|#import\s)").unwrap()
});

static MATLAB_MARKERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(function\s+(\[[^\]]*\]\s*=\s*)?\w+|%|end\s*$|disp\(|fprintf\()")
        .unwrap()
});

static PERL_MARKERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(use\s+(strict|warnings)|my\s+[\$@%]|sub\s+\w+|package\s+\w+)|^#!.*perl")
        .unwrap()
});

static PROLOG_CLAUSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*([a-z]\w*(\(.*\))?\s*:-|:-\s*\w+)").unwrap());

static QT_TS_MARKERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<!DOCTYPE TS>|<TS\s+version=").unwrap());

/// Primary language for a lowercased extension (without the dot).
pub fn language_for_extension(ext: &str) -> Option<&'static str> {
    let language = match ext {
        "py" => "Python",
        "js" => "JavaScript",
        "ts" => "TypeScript",
        "java" => "Java",
        "c" => "C",
        "cpp" | "cc" | "cxx" => "C++",
        "h" => "C Header",
        "hpp" => "C++ Header",
        "cs" => "C#",
        "php" => "PHP",
        "rb" => "Ruby",
        "go" => "Go",
        "rs" => "Rust",
        "swift" => "Swift",
        "kt" => "Kotlin",
        "scala" => "Scala",
        "html" => "HTML",
        "css" => "CSS",
        "scss" => "SCSS",
        "sass" => "Sass",
        "less" => "Less",
        "xml" => "XML",
        "json" => "JSON",
        "yaml" | "yml" => "YAML",
        "md" => "Markdown",
        "sh" => "Shell",
        "bash" => "Bash",
        "zsh" => "Zsh",
        "fish" => "Fish",
        "sql" => "SQL",
        "r" => "R",
        "m" => "Objective-C",
        "mm" => "Objective-C++",
        "pl" => "Perl",
        "lua" => "Lua",
        "vim" => "Vim Script",
        "dart" => "Dart",
        "elm" => "Elm",
        "ex" | "exs" => "Elixir",
        "clj" => "Clojure",
        "hs" => "Haskell",
        "ml" => "OCaml",
        "fs" => "F#",
        "jl" => "Julia",
        "nim" => "Nim",
        "zig" => "Zig",
        _ => return None,
    };
    Some(language)
}

/// Detects the language of a file.
///
/// Ambiguous extensions (`.h`, `.m`, `.pl`, `.ts`) and extensionless scripts
/// are disambiguated from the first few KB of content.
pub fn detect_language(path: &Path) -> Option<String> {
    let Some(ext) = path.extension() else {
        return read_head(path).and_then(|head| shebang_language(&head)).map(String::from);
    };
    let ext = ext.to_string_lossy().to_lowercase();
    let primary = language_for_extension(&ext)?;

    let sniffed = if is_ambiguous(&ext) {
        read_head(path).and_then(|head| sniff(&ext, &head))
    } else {
        None
    };

    Some(sniffed.unwrap_or(primary).to_string())
}

fn is_ambiguous(ext: &str) -> bool {
    matches!(ext, "h" | "m" | "pl" | "ts")
}

/// Disambiguates an extension from file content.
///
/// Returns `None` when the content gives no signal, in which case the table's
/// primary mapping applies.
pub fn sniff(ext: &str, content: &str) -> Option<&'static str> {
    match ext {
        "h" => {
            if OBJC_MARKERS.is_match(content) {
                Some("Objective-C")
            } else if CPP_MARKERS.is_match(content) {
                Some("C++ Header")
            } else {
                None
            }
        }
        "m" => {
            if OBJC_MARKERS.is_match(content) {
                None
            } else if MATLAB_MARKERS.is_match(content) {
                Some("MATLAB")
            } else {
                None
            }
        }
        "pl" => (!PERL_MARKERS.is_match(content) && PROLOG_CLAUSE.is_match(content))
            .then_some("Prolog"),
        "ts" => QT_TS_MARKERS.is_match(content).then_some("Qt Linguist"),
        _ => None,
    }
}

/// Language named by a `#!` interpreter line.
pub fn shebang_language(content: &str) -> Option<&'static str> {
    let first = content.lines().next()?.strip_prefix("#!")?;
    let mut parts = first.split_whitespace();
    let mut interpreter = parts.next()?.rsplit('/').next()?;
    if interpreter == "env" {
        interpreter = parts.find(|arg| !arg.starts_with('-'))?;
    }

    let language = match interpreter.trim_end_matches(|c: char| c.is_ascii_digit() || c == '.') {
        "python" => "Python",
        "node" => "JavaScript",
        "bash" => "Bash",
        "sh" => "Shell",
        "zsh" => "Zsh",
        "ruby" => "Ruby",
        "perl" => "Perl",
        _ => return None,
    };
    Some(language)
}

fn read_head(path: &Path) -> Option<String> {
    let file = File::open(path).ok()?;
    let mut buf = Vec::new();
    file.take(SNIFF_BYTES).read_to_end(&mut buf).ok()?;
    Some(String::from_utf8_lossy(&buf).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;

    #[test]
    fn test_extension_table_is_case_insensitive() {
        let dir = tempfile::Builder::new().prefix("ht-lang").tempdir().unwrap();
        let path = dir.path().join("Main.PY");
        fs::write(&path, "print(1)").unwrap();
        assert_eq!(detect_language(&path).as_deref(), Some("Python"));
    }

    #[test]
    fn test_unknown_extension_has_no_language() {
        assert_eq!(detect_language(Path::new("/repo/data.parquet")), None);
    }

    #[test]
    fn test_header_sniffing() {
        assert_eq!(sniff("h", "#include <stdio.h>\nint f(void);\n"), None);
        assert_eq!(
            sniff("h", "#include <vector>\nclass Widget {};\n"),
            Some("C++ Header")
        );
        assert_eq!(
            sniff("h", "#import <Foundation/Foundation.h>\n@interface Foo : NSObject\n@end\n"),
            Some("Objective-C")
        );
    }

    #[test]
    fn test_dot_m_sniffing() {
        assert_eq!(
            sniff("m", "function y = square(x)\n  y = x.^2;\nend\n"),
            Some("MATLAB")
        );
        assert_eq!(sniff("m", "@implementation Foo\n@end\n"), None);
    }

    #[test]
    fn test_dot_pl_sniffing() {
        assert_eq!(
            sniff("pl", "parent(tom, bob).\ngrandparent(X, Z) :- parent(X, Y), parent(Y, Z).\n"),
            Some("Prolog")
        );
        assert_eq!(sniff("pl", "use strict;\nmy $x = 1;\n"), None);
    }

    #[test]
    fn test_dot_ts_sniffing() {
        assert_eq!(
            sniff("ts", "<?xml version=\"1.0\"?>\n<!DOCTYPE TS>\n<TS version=\"2.1\">\n"),
            Some("Qt Linguist")
        );
        assert_eq!(sniff("ts", "export const x: number = 1;\n"), None);
    }

    #[test]
    fn test_ambiguous_extension_resolved_from_file() {
        let dir = tempfile::Builder::new().prefix("ht-lang").tempdir().unwrap();
        let path = dir.path().join("widget.h");
        fs::write(&path, "namespace ui {\nclass Widget;\n}\n").unwrap();
        assert_eq!(detect_language(&path).as_deref(), Some("C++ Header"));
    }

    #[test]
    fn test_shebang_detection() {
        assert_eq!(shebang_language("#!/usr/bin/env python3\n"), Some("Python"));
        assert_eq!(shebang_language("#!/bin/bash\nset -e\n"), Some("Bash"));
        assert_eq!(shebang_language("#!/usr/bin/env -S node --harmony\n"), Some("JavaScript"));
        assert_eq!(shebang_language("echo hi\n"), None);
    }
}
