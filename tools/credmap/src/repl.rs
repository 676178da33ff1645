use crate::board::{render_board, render_plain, status_line};
use crate::commands::{commands_legend, parse_command, Command};
use crate::errors::CredmapError;
use crate::field::FieldId;
use crate::partition::BucketId;
use crate::runtime::Terminal;
use crate::session::Session;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Reads commands until `quit` or end of input. Command failures are printed
/// and the loop keeps going; only terminal failures end it early.
pub fn run_repl(
    session: &mut Session,
    terminal: &dyn Terminal,
    runtime: &tokio::runtime::Runtime,
    cwd: &Path,
) -> Result<(), CredmapError> {
    terminal.write_line("credmap interactive session; type help for commands")?;
    while let Some(line) = terminal.read_line()? {
        if line.trim().is_empty() {
            continue;
        }
        let outcome = parse_command(&line)
            .and_then(|command| execute(session, terminal, runtime, cwd, command));
        match outcome {
            Ok(Flow::Quit) => break,
            Ok(Flow::Continue) => {}
            Err(err) => terminal.write_line(&format!("error: {err}"))?,
        }
    }
    Ok(())
}

pub fn execute(
    session: &mut Session,
    terminal: &dyn Terminal,
    runtime: &tokio::runtime::Runtime,
    cwd: &Path,
    command: Command,
) -> Result<Flow, CredmapError> {
    match command {
        Command::Load(path) => {
            let path = if path.is_absolute() { path } else { cwd.join(path) };
            let summary = runtime.block_on(session.load_file(&path))?;
            terminal.write_line(&format!(
                "loaded {}: {} step(s), {} field(s)",
                summary.title.as_deref().unwrap_or("untitled recording"),
                summary.steps,
                summary.fields
            ))?;
        }
        Command::Show => show(session, terminal)?,
        Command::Move {
            from,
            from_index,
            to,
            to_index,
        } => {
            let field = session.move_at(from, from_index, to.clone(), to_index)?;
            report_move(session, terminal, &field, &to)?;
        }
        Command::Assign { role, index } => {
            let field = session.assign(role.clone(), index)?;
            report_move(session, terminal, &field, &role)?;
        }
        Command::Unassign { role, index } => {
            let field = session.unassign(role, index)?;
            report_move(session, terminal, &field, &BucketId::Unassigned)?;
        }
        Command::Undo => {
            let message = if session.undo()? { "undone" } else { "nothing to undo" };
            terminal.write_line(message)?;
        }
        Command::Redo => {
            let message = if session.redo()? { "redone" } else { "nothing to redo" };
            terminal.write_line(message)?;
        }
        Command::Set { name, value } => {
            session.set_option(&name, &value)?;
            let shown = session
                .options()
                .get(&name)
                .map(|value| value.to_string())
                .unwrap_or_default();
            terminal.write_line(&format!("{name} = {shown}"))?;
        }
        Command::Options => {
            for line in session.options().listing() {
                terminal.write_line(&line)?;
            }
        }
        Command::Generate => {
            let payload = session.synthesize()?;
            terminal.write_line(&payload.to_pretty_json()?)?;
        }
        Command::Help => terminal.write_line(&commands_legend())?,
        Command::Quit => return Ok(Flow::Quit),
    }
    Ok(Flow::Continue)
}

pub fn show(session: &Session, terminal: &dyn Terminal) -> Result<(), CredmapError> {
    let view = session.buckets_view()?;
    let readiness = session.readiness()?;
    if terminal.stdin_is_tty() {
        let (width, height) = terminal.size();
        terminal.draw(&render_board(&view, &readiness, width, height)?)
    } else {
        for line in render_plain(&view, &readiness) {
            terminal.write_line(&line)?;
        }
        Ok(())
    }
}

fn report_move(
    session: &Session,
    terminal: &dyn Terminal,
    field: &FieldId,
    to: &BucketId,
) -> Result<(), CredmapError> {
    terminal.write_line(&format!("moved {} to {to}", field.short_digest()))?;
    terminal.write_line(&status_line(&session.readiness()?))
}

#[cfg(test)]
mod tests {
    use super::run_repl;
    use crate::runtime::FakeTerminal;
    use crate::session::{Session, SessionSettings};
    use std::io::Write;

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("runtime")
    }

    fn recording_file(dir: &tempfile::TempDir) -> std::path::PathBuf {
        let path = dir.path().join("login.json");
        let mut file = std::fs::File::create(&path).expect("create");
        write!(
            file,
            r##"{{"title": "login", "steps": [
                {{"type": "change", "selectors": [["#user"]], "value": "alice"}},
                {{"type": "change", "selectors": [["#old"]], "value": "old"}},
                {{"type": "change", "selectors": [["#new"]], "value": "fresh"}}
            ]}}"##
        )
        .expect("write");
        path
    }

    #[test]
    fn scripted_session_produces_payload() {
        let dir = tempfile::tempdir().expect("tempdir");
        recording_file(&dir);
        let terminal = FakeTerminal::with_input(
            false,
            [
                "load login.json",
                "generate",
                "assign usernameMappings 0",
                "assign passwordMappings 0",
                "move unassigned:0 newPasswordMappings:0",
                "set length 20",
                "show",
                "generate",
                "quit",
                "show",
            ],
        );
        let mut session = Session::new(SessionSettings::default());
        run_repl(&mut session, &terminal, &runtime(), dir.path()).expect("repl");

        let lines = terminal.written_lines();
        assert!(lines.iter().any(|l| l == "loaded login: 3 step(s), 3 field(s)"));
        assert!(lines
            .iter()
            .any(|l| l.starts_with("error: please map all fields before generating the payload")));
        assert!(lines.iter().any(|l| l == "length = 20"));
        assert!(lines.iter().any(|l| l.starts_with("ready")));
        let payload = lines.iter().rev().find(|l| l.starts_with('{')).expect("payload");
        let value: serde_json::Value = serde_json::from_str(payload).expect("json");
        assert_eq!(value["username"], "alice");
        assert_eq!(value["password"], "fresh");
        assert_eq!(value["passwordOptions"]["length"], 20);
        // Nothing after quit runs.
        assert_eq!(lines.iter().filter(|l| l.starts_with("unassigned")).count(), 1);
    }

    #[test]
    fn errors_are_printed_and_loop_continues() {
        let terminal = FakeTerminal::with_input(
            true,
            ["show", "frobnicate", "load missing.json", "undo", "help"],
        );
        let mut session = Session::new(SessionSettings::default());
        let dir = tempfile::tempdir().expect("tempdir");
        run_repl(&mut session, &terminal, &runtime(), dir.path()).expect("repl");

        let lines = terminal.written_lines();
        let errors = lines.iter().filter(|l| l.starts_with("error: ")).count();
        assert_eq!(errors, 4);
        assert!(lines.last().is_some_and(|l| l.starts_with("Commands:")));
        assert!(terminal.drawn_frames().is_empty());
    }

    #[test]
    fn tty_show_draws_a_frame() {
        let dir = tempfile::tempdir().expect("tempdir");
        recording_file(&dir);
        let terminal = FakeTerminal::with_input(true, ["load login.json", "show"]);
        let mut session = Session::new(SessionSettings::default());
        run_repl(&mut session, &terminal, &runtime(), dir.path()).expect("repl");

        let frames = terminal.drawn_frames();
        assert_eq!(frames.len(), 1);
        assert!(frames[0].contains("unassigned (3)"));
    }
}
