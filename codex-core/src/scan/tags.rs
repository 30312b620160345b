//! Tag inference from file extension and filename keywords.

use crate::config::TagsConfig;
use std::collections::BTreeSet;
use std::path::Path;

use super::filter::file_extension;

/// Built-in extension rules, in match order
const EXTENSION_TAGS: &[(&str, &[&str])] = &[
    (".ino", &["arduino"]),
    (".py", &["python"]),
    (".js", &["javascript"]),
    (".c", &["c"]),
    (".cpp", &["cpp", "c++"]),
    (".h", &["c", "header"]),
    (".hpp", &["cpp", "c++", "header"]),
    (".java", &["java"]),
    (".cs", &["csharp", "c#"]),
    (".php", &["php"]),
    (".rb", &["ruby"]),
    (".go", &["go", "golang"]),
    (".rs", &["rust"]),
    (".swift", &["swift", "ios"]),
    (".kt", &["kotlin", "android"]),
    (".m", &["objective-c", "ios"]),
    (".mm", &["objective-c++", "ios"]),
    (".sql", &["sql", "database"]),
    (".html", &["html", "web"]),
    (".css", &["css", "web"]),
    (".scss", &["scss", "sass", "web"]),
    (".xml", &["xml"]),
    (".json", &["json"]),
    (".yaml", &["yaml", "config"]),
    (".yml", &["yaml", "config"]),
    (".md", &["markdown", "documentation"]),
    (".txt", &["text"]),
];

/// Built-in filename keyword rules, in match order
const KEYWORD_TAGS: &[(&str, &[&str])] = &[
    ("motor", &["motor", "hardware"]),
    ("sensor", &["sensor", "hardware"]),
    ("servo", &["servo", "motor", "hardware"]),
    ("bluetooth", &["bluetooth", "wireless"]),
    ("wifi", &["wifi", "wireless", "network"]),
    ("esp32", &["esp32", "microcontroller"]),
    ("esp8266", &["esp8266", "microcontroller"]),
    ("arduino", &["arduino", "microcontroller"]),
    ("raspberry", &["raspberry-pi", "sbc"]),
    ("serial", &["serial", "communication"]),
    ("i2c", &["i2c", "communication"]),
    ("spi", &["spi", "communication"]),
    ("mqtt", &["mqtt", "iot"]),
    ("http", &["http", "web", "api"]),
    ("database", &["database"]),
    ("api", &["api"]),
    ("test", &["testing"]),
    ("config", &["configuration"]),
    ("setup", &["setup", "configuration"]),
    ("main", &["main", "entry-point"]),
    ("lib", &["library"]),
    ("util", &["utility"]),
    ("helper", &["helper", "utility"]),
];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Matcher {
    /// Exact lowercased extension, with leading dot
    Extension(String),
    /// Substring of the lowercased file name
    Keyword(String),
}

#[derive(Debug, Clone)]
struct TagRule {
    matcher: Matcher,
    tags: Vec<String>,
}

/// Ordered rule table mapping paths to tag names
#[derive(Debug, Clone)]
pub struct TagRules {
    rules: Vec<TagRule>,
}

impl Default for TagRules {
    fn default() -> Self {
        let extension_rules = EXTENSION_TAGS.iter().map(|(ext, tags)| TagRule {
            matcher: Matcher::Extension(ext.to_string()),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        });
        let keyword_rules = KEYWORD_TAGS.iter().map(|(kw, tags)| TagRule {
            matcher: Matcher::Keyword(kw.to_string()),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        });
        Self {
            rules: extension_rules.chain(keyword_rules).collect(),
        }
    }
}

impl TagRules {
    /// Built-in rules followed by the configured extras
    pub fn from_config(config: &TagsConfig) -> Self {
        let mut rules = Self::default();
        for (ext, tags) in &config.extensions {
            let ext = ext.trim().to_lowercase();
            let ext = if ext.starts_with('.') {
                ext
            } else {
                format!(".{}", ext)
            };
            rules.push(Matcher::Extension(ext), tags);
        }
        for (keyword, tags) in &config.keywords {
            rules.push(Matcher::Keyword(keyword.trim().to_lowercase()), tags);
        }
        rules
    }

    fn push(&mut self, matcher: Matcher, tags: &[String]) {
        self.rules.push(TagRule {
            matcher,
            tags: tags
                .iter()
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
        });
    }

    /// De-duplicated tag names for a path
    pub fn infer(&self, path: &Path) -> BTreeSet<String> {
        let ext = file_extension(path);
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        self.rules
            .iter()
            .filter(|rule| match &rule.matcher {
                Matcher::Extension(e) => *e == ext,
                Matcher::Keyword(k) => !k.is_empty() && filename.contains(k.as_str()),
            })
            .flat_map(|rule| rule.tags.iter().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(tags: BTreeSet<String>) -> Vec<String> {
        tags.into_iter().collect()
    }

    #[test]
    fn test_extension_tags() {
        let rules = TagRules::default();
        assert_eq!(
            names(rules.infer(Path::new("/r/widget.hpp"))),
            vec!["c++", "cpp", "header"]
        );
        assert_eq!(names(rules.infer(Path::new("/r/x.py"))), vec!["python"]);
        assert!(rules.infer(Path::new("/r/data.bin")).is_empty());
    }

    #[test]
    fn test_keyword_tags_are_deduplicated() {
        let rules = TagRules::default();
        let tags = names(rules.infer(Path::new("/r/Servo_Motor_Driver.ino")));
        assert_eq!(tags, vec!["arduino", "hardware", "motor", "servo"]);
    }

    #[test]
    fn test_keywords_match_filename_not_directories() {
        let rules = TagRules::default();
        let tags = rules.infer(Path::new("/sensor/project/readme.md"));
        assert!(!tags.contains("sensor"));
        assert!(tags.contains("markdown"));
    }

    #[test]
    fn test_configured_rules_extend_builtin_table() {
        let mut config = TagsConfig::default();
        config
            .extensions
            .insert("VUE".to_string(), vec!["vue".to_string(), "Web".to_string()]);
        config
            .keywords
            .insert("pump".to_string(), vec!["pump".to_string(), "hardware".to_string()]);
        let rules = TagRules::from_config(&config);

        assert_eq!(names(rules.infer(Path::new("/r/App.vue"))), vec!["vue", "web"]);
        assert_eq!(
            names(rules.infer(Path::new("/r/pump_ctl.py"))),
            vec!["hardware", "pump", "python"]
        );
    }
}
