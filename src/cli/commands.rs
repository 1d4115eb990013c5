use std::fmt::Write as _;
use std::io::{self, Read};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use parking_lot::RwLock;

use crate::api::{BackendClient, NotesApi};
use crate::app::actions::ActionDispatcher;
use crate::app::editor::NoteEditor;
use crate::app::reminder::{local_now, ReminderEditor};
use crate::app::App;
use crate::auth::{self, LoginForm, RegisterForm, ResetForm};
use crate::calendar::{self, EventSource, EventWindow};
use crate::config::{AppConfig, ConfigPaths};
use crate::model::{Frequency, Note, UNTITLED};
use crate::proxy::{self, ProxyState};
use crate::search::{filter_notes, StatusFilter};
use crate::session::{SessionAccessor, SessionCookies, SessionStore};
use crate::store::{NoteStore, StoreAction};

#[derive(Args, Debug, Clone)]
pub struct LoginArgs {
    #[arg(long)]
    pub email: Option<String>,
    /// Prompted if omitted
    #[arg(long)]
    pub password: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct RegisterArgs {
    #[arg(long)]
    pub username: Option<String>,
    #[arg(long)]
    pub email: Option<String>,
    #[arg(long)]
    pub password: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ForgotArgs {
    /// Address the reset link is mailed to
    pub email: String,
}

#[derive(Args, Debug, Clone)]
pub struct ResetArgs {
    /// Token from the reset email
    pub token: String,
    #[arg(long)]
    pub password: Option<String>,
    #[arg(long)]
    pub confirm: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    /// Completion status to keep
    #[arg(long, value_enum, default_value_t = StatusFilter::All)]
    pub filter: StatusFilter,
    /// Case-insensitive text to look for in titles, bodies and todo items
    #[arg(long)]
    pub query: Option<String>,
    /// Show the trash instead of the workspace
    #[arg(long)]
    pub trash: bool,
}

#[derive(Args, Debug, Clone)]
pub struct NewArgs {
    /// Title for the note (prompted if omitted)
    #[arg()]
    pub title: Option<String>,
    /// Provide the note body inline. If omitted, reads from stdin.
    #[arg(long)]
    pub body: Option<String>,
    /// Make a todo note; repeat for each item
    #[arg(long = "todo")]
    pub todos: Vec<String>,
    /// Palette color name
    #[arg(long)]
    pub color: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct DeleteArgs {
    pub note_id: u64,
    /// Confirm moving the note to the trash
    #[arg(long)]
    pub yes: bool,
}

#[derive(Args, Debug, Clone)]
pub struct RestoreArgs {
    pub note_id: u64,
}

#[derive(Subcommand, Debug, Clone)]
pub enum TagCommand {
    /// List every tag with its note count
    List,
    /// Create a new tag
    Create { name: String },
    /// Rename a tag across all notes
    Rename { tag_id: u64, name: String },
    /// Delete a tag from all notes
    Delete { tag_id: u64 },
    /// Attach a tag to a note
    Add { note_id: u64, tag_id: u64 },
    /// Remove a tag from a note
    Remove { note_id: u64, tag_id: u64 },
}

#[derive(Args, Debug, Clone)]
pub struct TagArgs {
    #[command(subcommand)]
    pub command: TagCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ShareCommand {
    /// Show who a note is shared with
    List { note_id: u64 },
    /// Invite a collaborator by email
    Add { note_id: u64, email: String },
    /// Remove a collaborator
    Remove { note_id: u64, email: String },
}

#[derive(Args, Debug, Clone)]
pub struct ShareArgs {
    #[command(subcommand)]
    pub command: ShareCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum RemindCommand {
    /// Create or replace a note's reminder
    Set {
        note_id: u64,
        /// Local time, `YYYY-MM-DD HH:MM`
        when: String,
        /// Repeat daily, weekly, monthly or yearly
        #[arg(long)]
        every: Option<Frequency>,
    },
    /// Remove a note's reminder
    Clear { note_id: u64 },
}

#[derive(Args, Debug, Clone)]
pub struct RemindArgs {
    #[command(subcommand)]
    pub command: RemindCommand,
}

#[derive(Args, Debug, Clone)]
pub struct CalendarArgs {
    pub note_id: u64,
    /// `YYYY-MM-DDTHH:MM`
    #[arg(long)]
    pub start: String,
    /// `YYYY-MM-DDTHH:MM`
    #[arg(long)]
    pub end: String,
}

#[derive(Args, Debug, Clone)]
pub struct ProxyArgs {
    /// Override `proxy.bind` from the config file
    #[arg(long)]
    pub bind: Option<String>,
}

/// The backend client plus the on-disk cookie jar it reads and updates.
pub struct Backend {
    sessions: SessionStore,
    cookies: Arc<RwLock<SessionCookies>>,
    client: Arc<BackendClient>,
    secret: Option<Vec<u8>>,
}

impl Backend {
    pub fn connect(config: &AppConfig, paths: &ConfigPaths) -> Result<Self> {
        let sessions = SessionStore::new(&paths.data_dir);
        let cookies = Arc::new(RwLock::new(sessions.load()?));
        let client = BackendClient::new(
            config.backend.origin_url()?,
            config.backend.timeout(),
            cookies.clone(),
        )
        .context("building HTTP client")?;
        Ok(Self {
            sessions,
            cookies,
            client: Arc::new(client),
            secret: config.proxy.jwt_secret(),
        })
    }

    pub fn api(&self) -> &BackendClient {
        &self.client
    }

    pub fn user_id(&self) -> Result<u64> {
        let cookies = self.cookies.read();
        SessionAccessor::new(&cookies, self.secret.as_deref())
            .user_id()
            .context("no usable session; run `mynote login` first")
    }

    /// Writes whatever cookies the last calls left behind.
    pub fn persist(&self) -> Result<()> {
        let cookies = self.cookies.read().clone();
        if cookies.is_logged_in() {
            self.sessions.save(&cookies)
        } else {
            self.sessions.clear()
        }
    }
}

pub fn run_tui(config: Arc<AppConfig>, paths: &ConfigPaths, backend: &Backend) -> Result<()> {
    let user_id = backend.user_id()?;
    let mut app = App::new(config, backend.client.clone(), paths, user_id)?;
    let result = app.run();
    backend.persist()?;
    result
}

pub fn login<A: NotesApi + ?Sized>(api: &A, args: LoginArgs) -> Result<String> {
    let form = LoginForm {
        email: value_or_prompt(args.email, "Email")?,
        password: value_or_prompt(args.password, "Password")?,
    };
    auth::login(api, &form).context("logging in")?;
    Ok(format!("Logged in as {}\n", form.email.trim()))
}

pub fn register<A: NotesApi + ?Sized>(api: &A, args: RegisterArgs) -> Result<String> {
    let form = RegisterForm {
        username: value_or_prompt(args.username, "Username")?,
        email: value_or_prompt(args.email, "Email")?,
        password: value_or_prompt(args.password, "Password")?,
    };
    auth::register(api, &form).context("registering")?;
    Ok("Account created. You can now log in.\n".to_string())
}

pub fn forgot<A: NotesApi + ?Sized>(api: &A, args: ForgotArgs) -> Result<String> {
    auth::forgot_password(api, &args.email).context("requesting password reset")?;
    Ok(format!("Reset instructions sent to {}\n", args.email.trim()))
}

pub fn reset<A: NotesApi + ?Sized>(api: &A, args: ResetArgs) -> Result<String> {
    let form = ResetForm {
        token: args.token,
        new_password: value_or_prompt(args.password, "New password")?,
        confirm_password: value_or_prompt(args.confirm, "Confirm password")?,
    };
    auth::reset_password(api, &form).context("resetting password")?;
    Ok("Password updated. You can now log in.\n".to_string())
}

pub fn logout<A: NotesApi + ?Sized>(api: &A) -> Result<String> {
    if let Err(err) = api.logout() {
        tracing::warn!(?err, "backend logout failed; dropping local session anyway");
    }
    Ok("Logged out\n".to_string())
}

pub fn whoami<A: NotesApi + ?Sized>(api: &A, user_id: u64) -> Result<String> {
    let user = api.user(user_id).context("fetching profile")?;
    Ok(format!("{} <{}> (#{})\n", user.username, user.email, user.user_id))
}

pub fn list<A: NotesApi + ?Sized>(api: &A, user_id: u64, args: &ListArgs) -> Result<String> {
    let dispatcher = ActionDispatcher::new(api);
    let mut store = NoteStore::new();
    let notes = if args.trash {
        store.apply(dispatcher.load_deleted(user_id).context("loading trash")?);
        store.deleted()
    } else {
        apply_all(&mut store, dispatcher.load_workspace(user_id).context("loading notes")?);
        store.notes()
    };
    let query = args.query.as_deref().unwrap_or("");
    let shown = filter_notes(notes, args.filter, query);
    Ok(format_note_list(&shown))
}

pub fn new_note<A: NotesApi + ?Sized>(
    api: &A,
    config: &AppConfig,
    args: NewArgs,
) -> Result<String> {
    let color = args.color.unwrap_or_else(|| config.ui.default_color.clone());
    if !config.ui.palette.contains(&color) {
        let known: Vec<&str> = config.ui.palette.names().collect();
        bail!("unknown color '{color}' (expected one of {})", known.join(", "));
    }
    let title = match args.title {
        Some(title) => title,
        None => prompt("Title")?,
    };

    let mut editor = NoteEditor::create(&color);
    editor.title.set_text(title);
    if args.todos.is_empty() {
        let body = match args.body {
            Some(body) => body,
            None => read_stdin()?.unwrap_or_default(),
        };
        editor.body.set_text(body);
    } else {
        editor.toggle_todo_mode();
        for (idx, item) in args.todos.iter().enumerate() {
            if idx > 0 {
                editor.add_todo();
            }
            item.chars().for_each(|ch| editor.push_todo_char(ch));
        }
    }

    let body = editor.new_note()?;
    let action = ActionDispatcher::new(api)
        .create_note(&body)
        .context("creating note")?;
    match action {
        StoreAction::Insert(note) => Ok(format!("Created note #{}\n", note.note_id)),
        _ => Ok("Created note\n".to_string()),
    }
}

pub fn delete<A: NotesApi + ?Sized>(api: &A, args: DeleteArgs) -> Result<String> {
    if !args.yes {
        bail!("refusing to delete note #{} without --yes", args.note_id);
    }
    ActionDispatcher::new(api)
        .delete_note(args.note_id)
        .with_context(|| format!("deleting note {}", args.note_id))?;
    Ok(format!("Moved note #{} to the trash\n", args.note_id))
}

pub fn restore<A: NotesApi + ?Sized>(api: &A, args: RestoreArgs) -> Result<String> {
    ActionDispatcher::new(api)
        .restore_note(args.note_id)
        .with_context(|| format!("restoring note {}", args.note_id))?;
    Ok(format!("Restored note #{}\n", args.note_id))
}

pub fn handle_tag_command<A: NotesApi + ?Sized>(api: &A, args: TagArgs) -> Result<String> {
    let dispatcher = ActionDispatcher::new(api);
    let out = match args.command {
        TagCommand::List => {
            let tags = api.list_tags().context("loading tags")?;
            if tags.is_empty() {
                return Ok("(no tags)\n".to_string());
            }
            let mut out = String::new();
            for tag in tags {
                let plural = if tag.notes.len() == 1 { "" } else { "s" };
                let _ = writeln!(
                    &mut out,
                    "#{:<4} {}  ({} note{plural})",
                    tag.tag_id,
                    tag.tag_name,
                    tag.notes.len()
                );
            }
            out
        }
        TagCommand::Create { name } => match dispatcher.create_tag(&name).context("creating tag")? {
            StoreAction::TagCreated(tag) => format!("Created tag '{}' (#{})\n", tag.tag_name, tag.tag_id),
            _ => format!("Created tag '{}'\n", name.trim()),
        },
        TagCommand::Rename { tag_id, name } => {
            dispatcher
                .rename_tag(tag_id, &name)
                .with_context(|| format!("renaming tag {tag_id}"))?;
            format!("Renamed tag #{tag_id} to '{}'\n", name.trim())
        }
        TagCommand::Delete { tag_id } => {
            dispatcher
                .delete_tag(tag_id)
                .with_context(|| format!("deleting tag {tag_id}"))?;
            format!("Deleted tag #{tag_id}\n")
        }
        TagCommand::Add { note_id, tag_id } => {
            dispatcher
                .attach_tag(note_id, tag_id)
                .with_context(|| format!("adding tag {tag_id} to note {note_id}"))?;
            format!("Added tag #{tag_id} to note #{note_id}\n")
        }
        TagCommand::Remove { note_id, tag_id } => {
            dispatcher
                .detach_tag(note_id, tag_id)
                .with_context(|| format!("removing tag {tag_id} from note {note_id}"))?;
            format!("Removed tag #{tag_id} from note #{note_id}\n")
        }
    };
    Ok(out)
}

pub fn handle_share_command<A: NotesApi + ?Sized>(api: &A, args: ShareArgs) -> Result<String> {
    let dispatcher = ActionDispatcher::new(api);
    let out = match args.command {
        ShareCommand::List { note_id } => {
            let entries = api
                .shared_emails(note_id)
                .with_context(|| format!("loading collaborators of note {note_id}"))?;
            if entries.is_empty() {
                return Ok(format!("Note #{note_id} is not shared\n"));
            }
            let mut out = String::new();
            for entry in entries {
                let role = if entry.is_removable() { "" } else { " (owner)" };
                let _ = writeln!(&mut out, "{}{role}", entry.email);
            }
            out
        }
        ShareCommand::Add { note_id, email } => {
            dispatcher
                .share(note_id, &email)
                .with_context(|| format!("sharing note {note_id}"))?;
            format!("Shared note #{note_id} with {}\n", email.trim())
        }
        ShareCommand::Remove { note_id, email } => {
            dispatcher
                .unshare(note_id, &email)
                .with_context(|| format!("unsharing note {note_id}"))?;
            format!("Removed {} from note #{note_id}\n", email.trim())
        }
    };
    Ok(out)
}

pub fn handle_remind_command<A: NotesApi + ?Sized>(
    api: &A,
    user_id: u64,
    args: RemindArgs,
) -> Result<String> {
    let dispatcher = ActionDispatcher::new(api);
    let mut store = NoteStore::new();
    apply_all(&mut store, dispatcher.load_workspace(user_id).context("loading notes")?);

    match args.command {
        RemindCommand::Set {
            note_id,
            when,
            every,
        } => {
            let note = find_note(&store, note_id)?;
            let now = local_now();
            let mut editor = ReminderEditor::open(note, now);
            if let Some(draft) = editor.draft_mut() {
                draft.when = when;
                draft.recurring = every.is_some();
                draft.frequency = every.unwrap_or_default();
            }
            let request = editor.request(now)?;
            dispatcher
                .save_reminder(&request)
                .with_context(|| format!("saving reminder for note {note_id}"))?;
            let repeat = request
                .reminder
                .frequency
                .map(|frequency| format!(", repeats {frequency}"))
                .unwrap_or_default();
            Ok(format!(
                "Reminder for note #{note_id} set to {}{repeat}\n",
                request.reminder.reminder_time
            ))
        }
        RemindCommand::Clear { note_id } => {
            let note = find_note(&store, note_id)?;
            let Some(reminder_id) = note.active_reminder().and_then(|r| r.reminder_id) else {
                return Ok(format!("Note #{note_id} has no reminder\n"));
            };
            dispatcher
                .clear_reminder(note_id, reminder_id)
                .with_context(|| format!("removing reminder {reminder_id}"))?;
            Ok(format!("Removed reminder from note #{note_id}\n"))
        }
    }
}

pub fn calendar<A: NotesApi + ?Sized>(
    api: &A,
    config: &AppConfig,
    user_id: u64,
    args: CalendarArgs,
) -> Result<String> {
    let mut store = NoteStore::new();
    apply_all(
        &mut store,
        ActionDispatcher::new(api)
            .load_workspace(user_id)
            .context("loading notes")?,
    );
    let note = find_note(&store, args.note_id)?;
    let source = EventSource {
        title: note.title(),
        body: if note.is_todo { "" } else { note.body() },
        todo_items: &note.todo_items,
    };
    let window = EventWindow {
        start: args.start,
        end: args.end,
    };
    let event = calendar::create_event(api, source, &window, &config.calendar)
        .context("creating calendar event")?;
    Ok(format!(
        "Added '{}' to the calendar ({} to {})\n",
        event.summary, event.start, event.end
    ))
}

pub fn authorize(config: &AppConfig) -> Result<String> {
    let url = auth::authorize_url(&config.backend.origin_url()?)?;
    Ok(format!("Open this URL to connect Google Calendar:\n{url}\n"))
}

pub fn run_proxy(config: &AppConfig, args: ProxyArgs) -> Result<()> {
    let bind = args.bind.unwrap_or_else(|| config.proxy.bind.clone());
    let addr = bind
        .parse()
        .with_context(|| format!("parsing socket address {bind}"))?;
    let state = ProxyState::new(config.proxy.jwt_secret());
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting tokio runtime")?;
    runtime.block_on(proxy::serve(addr, state))
}

fn apply_all(store: &mut NoteStore, actions: Vec<StoreAction>) {
    for action in actions {
        store.apply(action);
    }
}

fn find_note(store: &NoteStore, note_id: u64) -> Result<&Note> {
    match store.note(note_id) {
        Some(note) => Ok(note),
        None => bail!("note #{note_id} not found"),
    }
}

fn format_note_list(notes: &[&Note]) -> String {
    if notes.is_empty() {
        return "No notes found.\n".to_string();
    }
    let mut out = String::new();
    for note in notes {
        let title = if note.title().trim().is_empty() {
            UNTITLED
        } else {
            note.title()
        };
        let mut headline = format!("#{}  {title}", note.note_id);
        if note.is_priority() {
            headline.push_str("  [STARRED]");
        }
        if note.is_todo {
            let done = note.todo_items.iter().filter(|item| item.is_done).count();
            let _ = write!(&mut headline, "  [{done}/{} done]", note.todo_items.len());
        }
        let _ = writeln!(&mut out, "{headline}");
        let stamp = match &note.deleted_at {
            Some(deleted_at) => format!("deleted {deleted_at}"),
            None => format!("updated {}", note.updated_at),
        };
        let _ = writeln!(&mut out, "    {stamp}  color {}", note.color);
        if !note.tags.is_empty() {
            let tags: Vec<String> = note.tags.iter().map(|tag| format!("#{}", tag.tag_name)).collect();
            let _ = writeln!(&mut out, "    tags    {}", tags.join(" "));
        }
        if let Some(reminder) = note.active_reminder() {
            let _ = writeln!(&mut out, "    remind  {}", reminder.reminder_time);
        }
        if let Some(snippet) = build_snippet(note) {
            let _ = writeln!(&mut out, "    {snippet}");
        }
        out.push('\n');
    }
    out
}

fn build_snippet(note: &Note) -> Option<String> {
    let segments: Vec<String> = if note.is_todo {
        note.todo_items
            .iter()
            .map(|item| format!("[{}] {}", if item.is_done { "x" } else { " " }, item.content))
            .collect()
    } else {
        note.body()
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .take(2)
            .map(str::to_string)
            .collect()
    };
    if segments.is_empty() {
        return None;
    }
    Some(segments.join(" ").chars().take(160).collect())
}

fn value_or_prompt(value: Option<String>, label: &str) -> Result<String> {
    match value {
        Some(value) => Ok(value),
        None => prompt(label),
    }
}

fn prompt(label: &str) -> Result<String> {
    use std::io::Write;
    let mut stdout = io::stdout();
    write!(stdout, "{}: ", label)?;
    stdout.flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim_end().to_owned())
}

fn read_stdin() -> Result<Option<String>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(Some(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::FakeApi;
    use crate::model::{Reminder, SharedEmail, Tag};
    use crate::store::testing::{note, with_body, with_tag, with_todos};
    use crate::error::ClientError;

    type TestResult<T = ()> = Result<T>;

    fn workspace() -> FakeApi {
        let mut groceries = with_tag(
            with_body(note(1, "Groceries", "2024-05-01 00:00:00"), "eggs\nmilk\nbread"),
            3,
            "home",
        );
        groceries.priority = 1;
        let mut trip = with_todos(
            note(2, "Trip", "2024-04-01 00:00:00"),
            &[("passport", true), ("tickets", false)],
        );
        trip.reminder.push(Reminder {
            reminder_id: Some(9),
            note_id: 2,
            reminder_time: "2030-06-01 09:00:00".into(),
            recurring: false,
            frequency: None,
        });
        FakeApi::with_notes(vec![trip, groceries, note(3, "", "2024-01-01 00:00:00")])
    }

    #[test]
    fn list_prints_sorted_notes() -> TestResult {
        let api = workspace();
        let output = list(
            &api,
            1,
            &ListArgs {
                filter: StatusFilter::All,
                query: None,
                trash: false,
            },
        )?;
        insta::assert_snapshot!(output, @r###"
        #1  Groceries  [STARRED]
            updated 2024-05-01 00:00:00  color white
            tags    #home
            eggs milk

        #2  Trip  [1/2 done]
            updated 2024-04-01 00:00:00  color white
            remind  2030-06-01 09:00:00
            [x] passport [ ] tickets

        #3  Untitled
            updated 2024-01-01 00:00:00  color white
        "###);
        Ok(())
    }

    #[test]
    fn list_applies_filter_and_query() -> TestResult {
        let api = workspace();
        let output = list(
            &api,
            1,
            &ListArgs {
                filter: StatusFilter::Incomplete,
                query: Some("MILK".into()),
                trash: false,
            },
        )?;
        assert!(output.starts_with("#1  Groceries"));
        assert!(!output.contains("Trip"));

        let none = list(
            &api,
            1,
            &ListArgs {
                filter: StatusFilter::Completed,
                query: None,
                trash: false,
            },
        )?;
        assert_eq!(none, "No notes found.\n");
        Ok(())
    }

    #[test]
    fn delete_requires_confirmation() -> TestResult {
        let api = workspace();
        let err = delete(&api, DeleteArgs { note_id: 1, yes: false }).unwrap_err();
        assert!(err.to_string().contains("--yes"));
        assert!(api.calls().is_empty());

        delete(&api, DeleteArgs { note_id: 1, yes: true })?;
        assert_eq!(api.calls(), vec!["DELETE /note/1".to_string()]);
        Ok(())
    }

    #[test]
    fn new_todo_note_drops_blank_items() -> TestResult {
        let api = FakeApi::default();
        let config = AppConfig::default();
        let output = new_note(
            &api,
            &config,
            NewArgs {
                title: Some("Chores".into()),
                body: None,
                todos: vec!["a".into(), "  ".into(), "b".into()],
                color: None,
            },
        )?;
        assert!(output.starts_with("Created note #"));
        let bodies = api.created_bodies.lock();
        let items = bodies[0].todo_items.as_ref().expect("todo payload");
        let contents: Vec<&str> = items.iter().map(|item| item.content.as_str()).collect();
        assert_eq!(contents, vec!["a", "b"]);
        assert!(bodies[0].is_todo);
        assert_eq!(bodies[0].content, None);
        Ok(())
    }

    #[test]
    fn new_note_rejects_unknown_color() {
        let api = FakeApi::default();
        let err = new_note(
            &api,
            &AppConfig::default(),
            NewArgs {
                title: Some("x".into()),
                body: Some(String::new()),
                todos: Vec::new(),
                color: Some("ultraviolet".into()),
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("unknown color"));
        assert!(api.calls().is_empty());
    }

    #[test]
    fn past_reminder_is_rejected_before_any_write() -> TestResult {
        let api = workspace();
        let err = handle_remind_command(
            &api,
            1,
            RemindArgs {
                command: RemindCommand::Set {
                    note_id: 1,
                    when: "2001-01-01 08:00".into(),
                    every: None,
                },
            },
        )
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ClientError>(),
            Some(ClientError::Validation(_))
        ));
        assert!(api.reminders.lock().is_empty());
        Ok(())
    }

    #[test]
    fn clearing_a_reminder_uses_its_id() -> TestResult {
        let api = workspace();
        let output = handle_remind_command(
            &api,
            1,
            RemindArgs {
                command: RemindCommand::Clear { note_id: 2 },
            },
        )?;
        assert_eq!(output, "Removed reminder from note #2\n");
        assert!(api.calls().contains(&"DELETE /reminder/9".to_string()));
        Ok(())
    }

    #[test]
    fn tag_list_counts_notes() -> TestResult {
        let api = FakeApi::default();
        api.tags.lock().push(Tag {
            tag_id: 5,
            tag_name: "Work".into(),
            user_id: 1,
            notes: vec![1, 2],
        });
        let output = handle_tag_command(&api, TagArgs { command: TagCommand::List })?;
        assert_eq!(output, "#5    Work  (2 notes)\n");
        Ok(())
    }

    #[test]
    fn share_list_marks_owner() -> TestResult {
        let api = FakeApi::default();
        api.shared.lock().insert(
            4,
            vec![
                SharedEmail {
                    email: "owner@example.com".into(),
                    role: crate::model::ShareRole::Owner,
                },
                SharedEmail::collaborator("friend@example.com"),
            ],
        );
        let output = handle_share_command(
            &api,
            ShareArgs {
                command: ShareCommand::List { note_id: 4 },
            },
        )?;
        assert_eq!(output, "owner@example.com (owner)\nfriend@example.com\n");
        Ok(())
    }

    #[test]
    fn calendar_uses_todo_lines_for_todo_notes() -> TestResult {
        let api = workspace();
        let output = calendar(
            &api,
            &AppConfig::default(),
            1,
            CalendarArgs {
                note_id: 2,
                start: "2030-06-01T09:00".into(),
                end: "2030-06-01T10:00".into(),
            },
        )?;
        assert!(output.starts_with("Added 'Trip' to the calendar"));
        let events = api.events.lock();
        assert!(events[0].description.contains("passport"));
        Ok(())
    }
}
