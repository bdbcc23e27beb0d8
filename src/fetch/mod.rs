// src/fetch/mod.rs
//! Resolving a script identifier to SQL text.

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;

pub mod dir;
pub mod http;

pub use dir::DirScriptSource;
pub use http::HttpScriptSource;

/// Somewhere scripts can be read from by identifier.
pub trait ScriptSource {
    fn read_script(&self, script_id: &str) -> Result<String>;
}

impl<T: ScriptSource + ?Sized> ScriptSource for Box<T> {
    fn read_script(&self, script_id: &str) -> Result<String> {
        (**self).read_script(script_id)
    }
}

static SPACE_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(" +").expect("space-run pattern is valid"));

/// Collapse runs of spaces to one and drop every `;`.
///
/// Only single statements survive this: a script holding several statements
/// is run as one, and a `;` inside a string literal is removed too.
pub fn clean_script(raw: &str) -> String {
    SPACE_RUNS.replace_all(raw, " ").replace(';', "")
}

/// A script reference as accepted by `run_query`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptRef {
    /// Look the text up through a `ScriptSource`, then clean it.
    Id(String),
    /// Run this SQL as given.
    Raw(String),
}

impl ScriptRef {
    pub fn resolve(&self, source: &dyn ScriptSource) -> Result<String> {
        match self {
            ScriptRef::Id(id) => Ok(clean_script(&source.read_script(id)?)),
            ScriptRef::Raw(sql) => Ok(sql.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;

    struct Fixed;

    impl ScriptSource for Fixed {
        fn read_script(&self, script_id: &str) -> Result<String> {
            match script_id {
                "daily" => Ok("SELECT  a,   b\nFROM   t;".to_string()),
                _ => bail!("no script {script_id}"),
            }
        }
    }

    #[test]
    fn cleans_spaces_and_semicolons() {
        assert_eq!(clean_script("SELECT   *  FROM t;"), "SELECT * FROM t");
        // only spaces collapse, newlines and tabs stay
        assert_eq!(clean_script("a\n\n  b\t\tc"), "a\n\n b\t\tc");
        assert_eq!(clean_script("x; y;"), "x y");
    }

    #[test]
    fn resolves_ids_through_source_and_keeps_raw_sql() -> Result<()> {
        assert_eq!(
            ScriptRef::Id("daily".into()).resolve(&Fixed)?,
            "SELECT a, b\nFROM t"
        );
        assert_eq!(
            ScriptRef::Raw("SELECT 1;".into()).resolve(&Fixed)?,
            "SELECT 1;"
        );
        assert!(ScriptRef::Id("missing".into()).resolve(&Fixed).is_err());
        Ok(())
    }
}
