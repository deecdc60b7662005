//! Script execution for the `execute_code` command
//!
//! The bridge treats code execution like any other handler: an engine gets
//! the document and the code, and reports printed output plus an optional
//! result. No sandboxing happens here; the agent is trusted.

use std::collections::HashMap;

use uuid::Uuid;

use crate::scene::{wildcard_regex, Scene};

/// Script failure
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScriptError {
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("line {line}: {message}")]
    Runtime { line: usize, message: String },

    /// Raised by the script itself
    #[error("{0}")]
    Raised(String),
}

/// Something that can run code against a document
pub trait ScriptEngine<D>: Send + Sync {
    /// Run `code`; lines printed go to `output`
    ///
    /// Output printed before a failure stays in `output`.
    fn execute(
        &self,
        doc: &mut D,
        code: &str,
        output: &mut Vec<String>,
    ) -> Result<Option<String>, ScriptError>;
}

/// Line-oriented scene language for the demo document
///
/// ```text
/// # comment
/// layer Walls                    add a layer
/// use Walls                      make a layer current (creating it)
/// cube size=2 at=0,0,1 name=A    add a cube; $last holds its id
/// select col*                    select objects by name
/// delete col*                    delete objects by name
/// print created $last            print a line
/// set result done                set the script result
/// fail something went wrong      abort with an error
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct SceneScript;

impl SceneScript {
    pub fn new() -> Self {
        Self
    }
}

impl ScriptEngine<Scene> for SceneScript {
    fn execute(
        &self,
        scene: &mut Scene,
        code: &str,
        output: &mut Vec<String>,
    ) -> Result<Option<String>, ScriptError> {
        let mut result = None;
        let mut last: Option<Uuid> = None;

        for (index, raw) in code.lines().enumerate() {
            let line = index + 1;
            let text = raw.trim();
            if text.is_empty() || text.starts_with('#') {
                continue;
            }

            let text = match last {
                Some(id) => text.replace("$last", &id.to_string()),
                None => text.to_string(),
            };
            let (keyword, rest) = match text.split_once(char::is_whitespace) {
                Some((k, r)) => (k, r.trim()),
                None => (text.as_str(), ""),
            };

            match keyword {
                "print" => output.push(rest.to_string()),
                "layer" => {
                    require_arg(line, keyword, rest)?;
                    scene.add_layer(rest);
                }
                "use" => {
                    require_arg(line, keyword, rest)?;
                    scene.set_current_layer(rest);
                }
                "cube" => {
                    let args = parse_kv(line, rest)?;
                    let size = match args.get("size") {
                        Some(v) => parse_number(line, "size", v)?,
                        None => 1.0,
                    };
                    if size <= 0.0 {
                        return Err(ScriptError::Runtime {
                            line,
                            message: format!("cube size must be positive, got {}", size),
                        });
                    }
                    let at = match args.get("at") {
                        Some(v) => parse_point(line, v)?,
                        None => [0.0; 3],
                    };
                    let name = args.get("name").map(|n| n.to_string());
                    last = Some(scene.add_cube(size, at, name, None));
                }
                "select" | "delete" => {
                    require_arg(line, keyword, rest)?;
                    let pattern = wildcard_regex(rest).map_err(|e| ScriptError::Syntax {
                        line,
                        message: e.to_string(),
                    })?;
                    for id in scene.find_by_name(&pattern) {
                        if keyword == "select" {
                            scene.select(id, true);
                        } else {
                            scene.delete(id);
                        }
                    }
                }
                "set" => match rest.split_once(char::is_whitespace) {
                    Some(("result", value)) => result = Some(value.trim().to_string()),
                    _ if rest == "result" => result = Some(String::new()),
                    _ => {
                        return Err(ScriptError::Syntax {
                            line,
                            message: "expected 'set result <value>'".into(),
                        })
                    }
                },
                "fail" => {
                    let message = if rest.is_empty() { "script failed" } else { rest };
                    return Err(ScriptError::Raised(message.to_string()));
                }
                other => {
                    return Err(ScriptError::Syntax {
                        line,
                        message: format!("unknown statement '{}'", other),
                    })
                }
            }
        }

        Ok(result)
    }
}

fn require_arg(line: usize, keyword: &str, rest: &str) -> Result<(), ScriptError> {
    if rest.is_empty() {
        return Err(ScriptError::Syntax {
            line,
            message: format!("'{}' needs an argument", keyword),
        });
    }
    Ok(())
}

fn parse_kv(line: usize, rest: &str) -> Result<HashMap<&str, &str>, ScriptError> {
    rest.split_whitespace()
        .map(|pair| {
            pair.split_once('=').ok_or_else(|| ScriptError::Syntax {
                line,
                message: format!("expected key=value, got '{}'", pair),
            })
        })
        .collect()
}

fn parse_number(line: usize, key: &str, value: &str) -> Result<f64, ScriptError> {
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ScriptError::Syntax {
            line,
            message: format!("{} must be a number, got '{}'", key, value),
        })
}

fn parse_point(line: usize, value: &str) -> Result<[f64; 3], ScriptError> {
    let parts: Vec<&str> = value.split(',').collect();
    if parts.len() != 3 {
        return Err(ScriptError::Syntax {
            line,
            message: format!("at must be x,y,z, got '{}'", value),
        });
    }
    Ok([
        parse_number(line, "x", parts[0])?,
        parse_number(line, "y", parts[1])?,
        parse_number(line, "z", parts[2])?,
    ])
}
