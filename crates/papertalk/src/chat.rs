//! `ptalk chat`: an interactive question loop over one or more documents.
//!
//! Questions are read from stdin one line at a time. Blank lines are
//! ignored; `exit`, `quit` (any case), end of input, or Ctrl-C end the
//! session, and the transcript is written in every case. A failed question
//! is reported on stderr and the loop carries on with the same index and
//! history.

use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use papertalk_core::session::Session;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use crate::ask::write_answer;
use crate::config::Config;
use crate::index_cmd::display_names;
use crate::pipeline::{index_path, load_document, start_session};

pub async fn run_chat(
    config: &Config,
    files: &[PathBuf],
    index: Option<&Path>,
    rebuild: bool,
    transcript: Option<&Path>,
    show_evidence: bool,
) -> Result<()> {
    let path = index_path(config, index);
    let index = load_document(config, files, &path, rebuild).await?;
    let mut session = start_session(config, index)?;

    let interrupt = interrupt_signal();
    let interactive = atty::is(atty::Stream::Stdin);
    if interactive {
        eprintln!(
            "Loaded {} ({} chunks). Ask a question, or type 'exit' to quit.",
            display_names(files),
            session.index().len()
        );
    }

    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    chat_loop(
        &mut session,
        stdin,
        &mut stdout,
        interactive,
        show_evidence,
        interrupt,
    )
    .await?;

    if let Some(transcript) = transcript {
        write_transcript(&session, transcript)?;
    }
    Ok(())
}

/// Resolves on the first Ctrl-C.
///
/// On Unix the handler is installed before this returns, so a Ctrl-C
/// arriving between questions is not missed. If it cannot be installed the
/// future never resolves.
fn interrupt_signal() -> impl Future<Output = ()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let listener = signal(SignalKind::interrupt());
        async move {
            match listener {
                Ok(mut sigint) => {
                    sigint.recv().await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "cannot listen for Ctrl-C");
                    std::future::pending::<()>().await;
                }
            }
        }
    }
    #[cfg(not(unix))]
    {
        async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "cannot listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Drive `session` from `input` until an exit command, end of input, or
/// `interrupt` resolves.
///
/// An interrupt while an answer is being generated abandons that question
/// without recording it; turns already answered are kept. Returns the
/// number of questions answered.
pub async fn chat_loop<R, W, I>(
    session: &mut Session,
    input: R,
    out: &mut W,
    prompt: bool,
    show_evidence: bool,
    interrupt: I,
) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
    W: Write,
    I: Future<Output = ()>,
{
    let mut lines = input.lines();
    let mut answered = 0;
    tokio::pin!(interrupt);

    loop {
        if prompt {
            write!(out, "> ")?;
            out.flush()?;
        }
        let line = tokio::select! {
            biased;
            line = lines.next_line() => line?,
            _ = &mut interrupt => {
                eprintln!("\nInterrupted. Goodbye.");
                break;
            }
        };
        let Some(line) = line else {
            break;
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if is_exit_command(question) {
            break;
        }

        let result = tokio::select! {
            biased;
            result = session.ask(question) => result,
            _ = &mut interrupt => {
                eprintln!("\nInterrupted. Goodbye.");
                break;
            }
        };
        match result {
            Ok(answer) => {
                write_answer(out, &answer, show_evidence)?;
                writeln!(out)?;
                answered += 1;
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                if e.is_retryable() {
                    eprintln!("The backend may be unavailable; ask again to retry.");
                }
            }
        }
    }

    Ok(answered)
}

fn is_exit_command(line: &str) -> bool {
    line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit")
}

/// Write the conversation history as pretty JSON.
pub fn write_transcript(session: &Session, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(session.history())?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write transcript: {}", path.display()))?;
    tracing::info!(
        path = %path.display(),
        turns = session.history().len(),
        "wrote transcript"
    );
    Ok(())
}
