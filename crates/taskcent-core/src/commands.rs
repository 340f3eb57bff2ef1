use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, anyhow, bail};
use chrono::NaiveDate;
use tracing::{debug, info, instrument, warn};

use crate::cli::{AddArgs, AuthArgs, Command, EditArgs, PASSWORD_ENV};
use crate::config::Config;
use crate::datetime::today;
use crate::error::{ApiError, ErrorKind};
use crate::form::{FormError, TaskForm};
use crate::http::HttpApi;
use crate::modal::{
    DeleteOutcome, FocusTarget, Key, KeyOutcome, ListenerRegistry, ModalController, ModalState,
};
use crate::render::Renderer;
use crate::session::{self, ActiveSession, SessionFile};
use crate::store::TaskStore;
use crate::task::TaskId;

#[instrument(skip(cfg, data_dir, renderer, command))]
pub async fn dispatch(
    cfg: &Config,
    data_dir: &Path,
    renderer: &Renderer,
    command: Command,
) -> anyhow::Result<()> {
    let session_file = SessionFile::in_dir(data_dir);
    debug!(command = command.name(), "dispatching command");

    match command {
        Command::Login(args) => cmd_auth(cfg, &session_file, args, false).await,
        Command::Signup(args) => cmd_auth(cfg, &session_file, args, true).await,
        Command::Logout => cmd_logout(cfg, session_file),
        Command::List => {
            let active = open_session(cfg, session_file)?;
            cmd_list(active.store(), renderer).await
        }
        Command::Add(args) => {
            let active = open_session(cfg, session_file)?;
            cmd_add(active.store(), renderer, args).await
        }
        Command::Edit(args) => {
            let active = open_session(cfg, session_file)?;
            cmd_edit(active.store(), renderer, args).await
        }
        Command::Show { id } => {
            let id = parse_id(&id)?;
            let active = open_session(cfg, session_file)?;
            cmd_show(active.store(), renderer, &id).await
        }
        Command::Delete { id, yes } => {
            let id = parse_id(&id)?;
            let active = open_session(cfg, session_file)?;
            cmd_delete(active.store(), &id, yes).await
        }
        Command::Browse { id } => {
            let start = id.as_deref().map(parse_id).transpose()?;
            let active = open_session(cfg, session_file)?;
            let store = active.store();
            store.load_tasks().await.map_err(api_error)?;
            browse(store, renderer, start, io::stdin().lock(), io::stdout().lock(), today()).await
        }
    }
}

fn parse_id(raw: &str) -> anyhow::Result<TaskId> {
    raw.parse::<TaskId>()
        .map_err(|_| anyhow!("task id must not be empty"))
}

/// Adds a hint for the one failure a user can fix by signing in again.
fn api_error(err: ApiError) -> anyhow::Error {
    if err.kind() == ErrorKind::Permission {
        anyhow!("{err} (sign in again with `taskcent login`)")
    } else {
        anyhow::Error::new(err)
    }
}

fn form_error(err: FormError) -> anyhow::Error {
    match err {
        FormError::Validation(invalid) => anyhow!("{}: {}", invalid.field, invalid.message),
        FormError::Api(err) => api_error(err),
    }
}

fn open_session(cfg: &Config, file: SessionFile) -> anyhow::Result<ActiveSession> {
    let session = file
        .load()?
        .ok_or_else(|| anyhow!("not signed in; run `taskcent login --email <EMAIL>` first"))?;
    let api = HttpApi::new(cfg.api_url(), cfg.api_timeout())?.with_token(session.token.clone());
    Ok(ActiveSession::start(Arc::new(api), session, cfg.sort_order(), file))
}

#[instrument(skip(cfg, file, args), fields(email = %args.email))]
async fn cmd_auth(
    cfg: &Config,
    file: &SessionFile,
    args: AuthArgs,
    signing_up: bool,
) -> anyhow::Result<()> {
    let password = args
        .password
        .or_else(|| std::env::var(PASSWORD_ENV).ok())
        .ok_or_else(|| anyhow!("password required: pass --password or set {PASSWORD_ENV}"))?;
    let credentials = session::credentials(&args.email, &password, signing_up)?;

    let api = HttpApi::new(cfg.api_url(), cfg.api_timeout())?;
    let result = if signing_up {
        session::signup(&api, &credentials).await
    } else {
        session::login(&api, &credentials).await
    };

    let session = result?;

    file.save(&session)
        .with_context(|| format!("failed to save session to {}", file.path().display()))?;
    println!("Signed in as {}.", session.email);
    Ok(())
}

fn cmd_logout(cfg: &Config, file: SessionFile) -> anyhow::Result<()> {
    match file.load()? {
        Some(saved) => {
            let api = HttpApi::new(cfg.api_url(), cfg.api_timeout())?;
            let email = saved.email.clone();
            ActiveSession::start(Arc::new(api), saved, cfg.sort_order(), file).teardown()?;
            println!("Signed out {email}.");
        }
        None => println!("Not signed in."),
    }
    Ok(())
}

async fn cmd_list(store: &TaskStore, renderer: &Renderer) -> anyhow::Result<()> {
    store.load_tasks().await.map_err(api_error)?;
    renderer.print_task_table(&store.snapshot(), today())
}

async fn cmd_add(store: &TaskStore, renderer: &Renderer, args: AddArgs) -> anyhow::Result<()> {
    let defaults = TaskForm::default();
    let form = TaskForm {
        title: args.title,
        description: args.description.unwrap_or_default(),
        due_date: args.due,
        priority: args.priority.unwrap_or(defaults.priority),
        status: args.status.unwrap_or(defaults.status),
        category: args.category.unwrap_or_default(),
        ..defaults
    };

    let submission = form.submit(store).await.map_err(form_error)?;
    println!("{}.", submission.message());
    renderer.print_task_detail(submission.task(), None, today())
}

async fn cmd_edit(store: &TaskStore, renderer: &Renderer, args: EditArgs) -> anyhow::Result<()> {
    let id = parse_id(&args.id)?;
    store.load_tasks().await.map_err(api_error)?;
    let current = store
        .get(&id)
        .ok_or_else(|| anyhow!("no task with id {id}"))?;

    let mut form = TaskForm::edit(&current);
    if let Some(title) = args.title {
        form.title = title;
    }
    if let Some(due) = args.due {
        form.due_date = due;
    }
    if let Some(description) = args.description {
        form.description = description;
    }
    if let Some(priority) = args.priority {
        form.priority = priority;
    }
    if let Some(status) = args.status {
        form.status = status;
    }
    if let Some(category) = args.category {
        form.category = category;
    }
    if form == TaskForm::edit(&current) {
        warn!(id = %id, "edit requested without changes");
    }

    let submission = form.submit(store).await.map_err(form_error)?;
    println!("{}.", submission.message());
    renderer.print_task_detail(submission.task(), None, today())
}

async fn cmd_show(store: &TaskStore, renderer: &Renderer, id: &TaskId) -> anyhow::Result<()> {
    store.load_tasks().await.map_err(api_error)?;
    let tasks = store.snapshot();

    let mut modal = ModalController::new(ListenerRegistry::new());
    modal.show(id.clone());
    let task = tasks
        .iter()
        .find(|task| task.id() == id)
        .ok_or_else(|| anyhow!("no task with id {id}"))?;
    renderer.print_task_detail(task, modal.position(&tasks), today())
}

async fn cmd_delete(store: &TaskStore, id: &TaskId, yes: bool) -> anyhow::Result<()> {
    store.load_tasks().await.map_err(api_error)?;
    let task = store
        .get(id)
        .ok_or_else(|| anyhow!("no task with id {id}"))?;

    if !yes {
        print!("Delete task \"{}\"? [y/N] ", task.title);
        io::stdout().flush()?;
        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer)?;
        if !matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes") {
            println!("Cancelled.");
            return Ok(());
        }
    }

    store.delete_task(id).await.map_err(api_error)?;
    println!("Task deleted.");
    Ok(())
}

/// Interactive detail view. Each input line is one command: `k`/`up` and
/// `j`/`down` move through the collection, `d` asks to delete, `y`/`n`
/// answer the confirmation and `q` closes.
#[instrument(skip_all)]
pub async fn browse<R: BufRead, W: Write>(
    store: &TaskStore,
    renderer: &Renderer,
    start: Option<TaskId>,
    input: R,
    mut out: W,
    today: NaiveDate,
) -> anyhow::Result<()> {
    let tasks = store.snapshot();
    let first = match start {
        Some(id) if store.get(&id).is_some() => id,
        Some(id) => bail!("no task with id {id}"),
        None => match tasks.first() {
            Some(task) => task.id().clone(),
            None => {
                writeln!(out, "No tasks.")?;
                return Ok(());
            }
        },
    };

    let mut modal = ModalController::new(ListenerRegistry::new());
    modal.show(first);
    show_current(&modal, store, renderer, &mut out, today)?;

    for line in input.lines() {
        let line = line.context("failed to read input")?;
        let tasks = store.snapshot();

        let command = line.trim().to_ascii_lowercase();

        match command.as_str() {
            "k" | "up" | "j" | "down" => {
                let key = if matches!(command.as_str(), "k" | "up") {
                    Key::ArrowUp
                } else {
                    Key::ArrowDown
                };
                if let KeyOutcome::Navigated(_) = modal.handle_key(key, FocusTarget::None, &tasks) {
                    show_current(&modal, store, renderer, &mut out, today)?;
                }
            }
            "d" => {
                if modal.request_delete() {
                    writeln!(out, "Delete this task? [y/n]")?;
                }
            }
            "y" => {
                let Some(ticket) = modal.confirm_delete() else {
                    continue;
                };
                let index = modal.position(&tasks).map(|pos| pos.index).unwrap_or_default();
                let result = store.delete_task(ticket.task()).await;
                match modal.finish_delete(ticket, result) {
                    Ok(DeleteOutcome::Deleted(id)) => {
                        info!(id = %id, "deleted from detail view");
                        writeln!(out, "Task deleted.")?;
                        let remaining = store.snapshot();
                        let next = remaining.get(index).or_else(|| remaining.last());
                        match next {
                            Some(task) => {
                                modal.show(task.id().clone());
                                show_current(&modal, store, renderer, &mut out, today)?;
                            }
                            None => {
                                writeln!(out, "No tasks.")?;
                                break;
                            }
                        }
                    }
                    Ok(DeleteOutcome::Stale) => {}
                    Err(err) => writeln!(out, "Delete failed: {err}")?,
                }
            }
            "n" => {
                if matches!(modal.state(), ModalState::ConfirmingDelete { .. }) {
                    modal.cancel_delete();
                    writeln!(out, "Cancelled.")?;
                }
            }
            "q" | "esc" => {
                if modal.handle_key(Key::Escape, FocusTarget::None, &tasks) == KeyOutcome::Closed {
                    break;
                }
                if matches!(modal.state(), ModalState::Open { .. }) {
                    writeln!(out, "Cancelled.")?;
                }
            }
            "" => {}
            other => writeln!(out, "unknown command {other:?}; use k, j, d, y, n or q")?,
        }
    }

    modal.hide();
    Ok(())
}

fn show_current<W: Write>(
    modal: &ModalController,
    store: &TaskStore,
    renderer: &Renderer,
    out: &mut W,
    today: NaiveDate,
) -> anyhow::Result<()> {
    let tasks = store.snapshot();
    let Some(task) = modal
        .current()
        .and_then(|id| tasks.iter().find(|task| task.id() == id))
    else {
        writeln!(out, "Task no longer exists.")?;
        return Ok(());
    };
    renderer.write_task_detail(&mut *out, task, modal.position(&tasks), today)?;
    writeln!(out)?;
    Ok(())
}
