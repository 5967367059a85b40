use super::{Builtin, ShellProxy};
use jsh_types::{Context, ExitStatus};

/// Built-in help command implementation
/// Displays a list of all available built-in commands with their descriptions
pub fn command(ctx: &Context, _argv: Vec<String>, _proxy: &mut dyn ShellProxy) -> ExitStatus {
    let mut help_text = String::from("Built-in commands:\n");
    help_text.push('\n');

    for builtin in Builtin::ALL {
        help_text.push_str(&format!("{:<8} {}\n", builtin.name(), builtin.description()));
    }

    match ctx.write_stdout(help_text.trim_end()) {
        Ok(_) => ExitStatus::ExitedWith(0),
        Err(_) => ExitStatus::ExitedWith(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Captured, MockProxy};

    #[test]
    fn lists_every_builtin() {
        let mut cap = Captured::new();
        let mut proxy = MockProxy::default();
        command(&cap.ctx, vec!["help".into()], &mut proxy);
        let out = cap.stdout();
        for builtin in Builtin::ALL {
            assert!(out.contains(builtin.name()), "missing {}", builtin.name());
        }
    }
}
