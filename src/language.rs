use std::path::Path;

/// Tag returned for extensions not present in the table.
pub const UNKNOWN: &str = "unknown";

/// Classify a file by extension into a canonical language tag.
///
/// Pure lookup: lowercased extension → fixed tag, no content sniffing.
/// Unknown or missing extensions yield [`UNKNOWN`] rather than an error.
pub fn classify(path: &Path) -> &'static str {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return UNKNOWN;
    };

    // Case-insensitive: platform filesystems vary in case sensitivity.
    match ext.to_ascii_lowercase().as_str() {
        "py" => "python",
        "js" | "jsx" => "javascript",
        "ts" | "tsx" => "typescript",
        "java" => "java",
        "go" => "go",
        "rs" => "rust",
        "c" | "h" => "c",
        "cpp" | "cc" | "cxx" | "hpp" => "cpp",
        "cs" => "csharp",
        "rb" => "ruby",
        "php" => "php",
        "swift" => "swift",
        "kt" | "kts" => "kotlin",
        "scala" => "scala",
        "r" => "r",
        "m" | "mm" => "objective-c",
        "pl" => "perl",
        "lua" => "lua",
        "sh" | "bash" => "bash",
        "zsh" => "zsh",
        "fish" => "fish",
        "sql" => "sql",
        "html" => "html",
        "css" => "css",
        "scss" => "scss",
        "sass" => "sass",
        "vue" => "vue",
        "md" => "markdown",
        "json" => "json",
        "yaml" | "yml" => "yaml",
        "toml" => "toml",
        "xml" => "xml",
        _ => UNKNOWN,
    }
}
