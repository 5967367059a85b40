//! Command-line tokenizing: words via `shell-words`, then the `|`, `<`, `>`
//! and trailing `&` operators, which must stand as separate words.

use crate::process::pipeline::Stage;
use crate::process::redirect::Redirect;
use jsh_builtin::Builtin;
use jsh_types::LaunchError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandLine {
    Builtin(Builtin, Vec<String>),
    Pipeline {
        stages: Vec<Stage>,
        redirect: Option<Redirect>,
        background: bool,
    },
}

fn syntax(msg: &str) -> LaunchError {
    LaunchError::InvalidSyntax(msg.to_string())
}

fn is_operator(word: &str) -> bool {
    matches!(word, "|" | "<" | ">" | "&")
}

/// `Ok(None)` for a blank line or a comment.
pub fn parse_line(line: &str) -> Result<Option<CommandLine>, LaunchError> {
    let mut words = shell_words::split(line).map_err(|e| LaunchError::InvalidSyntax(e.to_string()))?;
    if words.is_empty() {
        return Ok(None);
    }

    let background = words.last().is_some_and(|w| w == "&");
    if background {
        words.pop();
        if words.is_empty() {
            return Err(syntax("missing command before '&'"));
        }
    }

    let mut stages: Vec<Stage> = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut redirect: Option<Redirect> = None;
    let mut words = words.into_iter();

    while let Some(word) = words.next() {
        match word.as_str() {
            "|" => {
                if current.is_empty() {
                    return Err(syntax("missing command before '|'"));
                }
                stages.push(Stage::new(std::mem::take(&mut current)));
            }
            "<" | ">" => {
                let target = match words.next() {
                    Some(target) if !is_operator(&target) => target,
                    _ => return Err(syntax("missing redirection target")),
                };
                if redirect.is_some() {
                    return Err(syntax("only one redirection is supported"));
                }
                redirect = Some(if word == "<" {
                    Redirect::Input(target)
                } else {
                    Redirect::StdoutOutput(target)
                });
            }
            "&" => return Err(syntax("'&' is only allowed at the end of a command")),
            _ => current.push(word),
        }
    }

    if current.is_empty() {
        return Err(if stages.is_empty() {
            syntax("missing command")
        } else {
            syntax("missing command after '|'")
        });
    }
    stages.push(Stage::new(current));

    if redirect.is_some() && stages.len() > 1 {
        return Err(syntax("redirection cannot be combined with '|'"));
    }

    if let [stage] = stages.as_slice()
        && let Some(builtin) = stage.program().and_then(Builtin::lookup)
    {
        if redirect.is_some() || background {
            return Err(LaunchError::InvalidSyntax(format!(
                "{}: builtins cannot be redirected or run in the background",
                builtin.name()
            )));
        }
        return Ok(Some(CommandLine::Builtin(builtin, stage.argv.clone())));
    }
    if let Some(builtin) = stages
        .iter()
        .find_map(|stage| stage.program().and_then(Builtin::lookup))
    {
        return Err(LaunchError::InvalidSyntax(format!(
            "{}: builtins cannot be used in a pipeline",
            builtin.name()
        )));
    }

    Ok(Some(CommandLine::Pipeline {
        stages,
        redirect,
        background,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline(line: &str) -> (Vec<Vec<String>>, Option<Redirect>, bool) {
        match parse_line(line).unwrap() {
            Some(CommandLine::Pipeline {
                stages,
                redirect,
                background,
            }) => (
                stages.into_iter().map(|s| s.argv).collect(),
                redirect,
                background,
            ),
            other => panic!("not a pipeline: {other:?}"),
        }
    }

    fn syntax_error(line: &str) {
        assert!(
            matches!(parse_line(line), Err(LaunchError::InvalidSyntax(_))),
            "accepted {line:?}"
        );
    }

    #[test]
    fn blank_lines_and_comments() {
        assert_eq!(parse_line("").unwrap(), None);
        assert_eq!(parse_line("   ").unwrap(), None);
        assert_eq!(parse_line("# nothing").unwrap(), None);
    }

    #[test]
    fn pipes_quotes_and_background() {
        let (stages, redirect, background) = pipeline("grep 'a b' file | wc -l &");
        assert_eq!(
            stages,
            vec![vec!["grep", "a b", "file"], vec!["wc", "-l"]]
        );
        assert_eq!(redirect, None);
        assert!(background);
    }

    #[test]
    fn redirections() {
        let (_, redirect, _) = pipeline("sort < in.txt");
        assert_eq!(redirect, Some(Redirect::Input("in.txt".into())));
        let (stages, redirect, _) = pipeline("echo hi > out.txt");
        assert_eq!(stages, vec![vec!["echo", "hi"]]);
        assert_eq!(redirect, Some(Redirect::StdoutOutput("out.txt".into())));
    }

    #[test]
    fn builtins() {
        assert_eq!(
            parse_line("fg %1").unwrap(),
            Some(CommandLine::Builtin(
                Builtin::Fg,
                vec!["fg".to_string(), "%1".to_string()]
            ))
        );
        syntax_error("jobs | cat");
        syntax_error("cat | wait");
        syntax_error("pwd > out");
        syntax_error("wait &");
    }

    #[test]
    fn malformed_lines() {
        syntax_error("| cat");
        syntax_error("cat |");
        syntax_error("cat | | wc");
        syntax_error("cat <");
        syntax_error("cat > | wc");
        syntax_error("cat < a > b");
        syntax_error("cat < a | wc");
        syntax_error("sleep 1 & echo");
        syntax_error("&");
        syntax_error("echo 'unterminated");
    }
}
