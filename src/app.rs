use anyhow::Result;
use crossterm::event::{Event, KeyCode, KeyEvent, KeyModifiers};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::mpsc;

use crate::auth::SessionManager;
use crate::contacts::{self, User};
use crate::storage::FileStore;
use crate::store::{self, Message, MessageStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Login,
    Register,
    Forgot,
    Chat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    /// 0 = email, 1 = password
    pub focus: usize,
}

#[derive(Debug, Default)]
pub struct RegisterForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm: String,
    /// 0 = name, 1 = email, 2 = password, 3 = confirm
    pub focus: usize,
}

#[derive(Debug, Default)]
pub struct ForgotForm {
    pub email: String,
    pub sent: bool,
}

pub struct AppOptions {
    pub data_dir: PathBuf,
    pub fresh: bool,
    pub email: Option<String>,
    pub password: Option<String>,
}

pub struct App {
    pub should_quit: bool,
    pub screen: Screen,
    pub input_mode: InputMode,
    pub input: String,
    pub cursor_position: usize,
    pub scroll_offset: usize,

    pub login_form: LoginForm,
    pub register_form: RegisterForm,
    pub forgot_form: ForgotForm,
    pub form_error: Option<String>,

    pub auth: SessionManager<FileStore>,
    pub store: MessageStore<FileStore>,
    pub current_user: Option<User>,
    pub contacts: Vec<User>,
    pub selected_contact: usize,
    pub search_query: String,
    pub status_messages: Vec<String>,
    unread: HashMap<String, usize>,

    reply_tx: mpsc::UnboundedSender<Message>,
    reply_rx: mpsc::UnboundedReceiver<Message>,
}

impl App {
    pub fn new(opts: AppOptions) -> Result<Self> {
        let mut files = FileStore::open(opts.data_dir)?;
        if opts.fresh {
            files.clear()?;
        }
        let auth = SessionManager::new(files.clone());
        let store = MessageStore::open(files)?;
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();

        let mut app = Self {
            should_quit: false,
            screen: Screen::Login,
            input_mode: InputMode::Normal,
            input: String::new(),
            cursor_position: 0,
            scroll_offset: 0,

            login_form: LoginForm::default(),
            register_form: RegisterForm::default(),
            forgot_form: ForgotForm::default(),
            form_error: None,

            auth,
            store,
            current_user: None,
            contacts: Vec::new(),
            selected_contact: 0,
            search_query: String::new(),
            status_messages: Vec::new(),
            unread: HashMap::new(),

            reply_tx,
            reply_rx,
        };

        if let (Some(email), Some(password)) = (opts.email.as_deref(), opts.password.as_deref()) {
            match app.auth.login(email, password) {
                Ok(user) => app.enter_chat(user),
                Err(err) => app.form_error = Some(err.to_string()),
            }
        } else if let Some(user) = app.auth.current_user() {
            // A previous session is still stored; skip the login screen.
            app.enter_chat(user);
        }

        Ok(app)
    }

    pub async fn handle_input(&mut self, event: Event) -> Result<()> {
        if let Event::Key(key) = event {
            match self.screen {
                Screen::Login => self.handle_login_key(key)?,
                Screen::Register => self.handle_register_key(key)?,
                Screen::Forgot => self.handle_forgot_key(key),
                Screen::Chat => self.handle_chat_key(key)?,
            }
        }
        Ok(())
    }

    /// Drain simulated replies delivered by the timer tasks.
    pub async fn on_tick(&mut self) -> Result<()> {
        while let Ok(message) = self.reply_rx.try_recv() {
            let sender_id = message.sender_id.clone();
            self.store.append(message)?;

            let viewing = self.screen == Screen::Chat
                && self
                    .selected_contact_user()
                    .map_or(false, |c| c.id == sender_id);
            if !viewing {
                *self.unread.entry(sender_id).or_default() += 1;
            }
        }
        Ok(())
    }

    // --- Auth screens ---

    fn handle_login_key(&mut self, key: KeyEvent) -> Result<()> {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('r') => self.switch_screen(Screen::Register),
                KeyCode::Char('f') => self.switch_screen(Screen::Forgot),
                _ => {}
            }
            return Ok(());
        }

        match key.code {
            KeyCode::Esc => self.should_quit = true,
            KeyCode::Tab | KeyCode::Down | KeyCode::BackTab | KeyCode::Up => {
                self.login_form.focus = (self.login_form.focus + 1) % 2;
            }
            KeyCode::Enter => {
                let email = self.login_form.email.trim().to_string();
                let password = self.login_form.password.clone();
                match self.auth.login(&email, &password) {
                    Ok(user) => self.enter_chat(user),
                    Err(err) => self.form_error = Some(err.to_string()),
                }
            }
            KeyCode::Char(c) => {
                self.form_error = None;
                match self.login_form.focus {
                    0 => self.login_form.email.push(c),
                    _ => self.login_form.password.push(c),
                }
            }
            KeyCode::Backspace => {
                match self.login_form.focus {
                    0 => self.login_form.email.pop(),
                    _ => self.login_form.password.pop(),
                };
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_register_key(&mut self, key: KeyEvent) -> Result<()> {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            if key.code == KeyCode::Char('l') {
                self.switch_screen(Screen::Login);
            }
            return Ok(());
        }

        match key.code {
            KeyCode::Esc => self.switch_screen(Screen::Login),
            KeyCode::Tab | KeyCode::Down => {
                self.register_form.focus = (self.register_form.focus + 1) % 4;
            }
            KeyCode::BackTab | KeyCode::Up => {
                self.register_form.focus = (self.register_form.focus + 3) % 4;
            }
            KeyCode::Enter => {
                if self.register_form.password != self.register_form.confirm {
                    self.form_error = Some("Passwords do not match".to_string());
                    return Ok(());
                }
                let name = self.register_form.name.clone();
                let email = self.register_form.email.trim().to_string();
                let password = self.register_form.password.clone();
                match self.auth.register(&name, &email, &password) {
                    Ok(user) => self.enter_chat(user),
                    Err(err) => self.form_error = Some(err.to_string()),
                }
            }
            KeyCode::Char(c) => {
                self.form_error = None;
                match self.register_form.focus {
                    0 => self.register_form.name.push(c),
                    1 => self.register_form.email.push(c),
                    2 => self.register_form.password.push(c),
                    _ => self.register_form.confirm.push(c),
                }
            }
            KeyCode::Backspace => {
                match self.register_form.focus {
                    0 => self.register_form.name.pop(),
                    1 => self.register_form.email.pop(),
                    2 => self.register_form.password.pop(),
                    _ => self.register_form.confirm.pop(),
                };
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_forgot_key(&mut self, key: KeyEvent) {
        if self.forgot_form.sent {
            // Any key returns to the login screen.
            self.switch_screen(Screen::Login);
            return;
        }

        match key.code {
            KeyCode::Esc => self.switch_screen(Screen::Login),
            KeyCode::Enter => {
                let email = self.forgot_form.email.trim().to_string();
                if email.is_empty() {
                    self.form_error = Some("Enter your email address".to_string());
                } else {
                    let note = self.auth.request_password_reset(&email);
                    self.add_status_message(note);
                    self.forgot_form.sent = true;
                }
            }
            KeyCode::Char(c) => {
                self.form_error = None;
                self.forgot_form.email.push(c);
            }
            KeyCode::Backspace => {
                self.forgot_form.email.pop();
            }
            _ => {}
        }
    }

    fn switch_screen(&mut self, screen: Screen) {
        self.screen = screen;
        self.form_error = None;
        self.login_form = LoginForm::default();
        self.register_form = RegisterForm::default();
        self.forgot_form = ForgotForm::default();
    }

    fn enter_chat(&mut self, user: User) {
        self.contacts = contacts::build_directory(&self.auth.accounts(), &user.id);
        self.add_status_message(format!("Signed in as {} ({})", user.name, user.email));
        self.current_user = Some(user);
        self.screen = Screen::Chat;
        self.input_mode = InputMode::Normal;
        self.selected_contact = 0;
        self.scroll_offset = 0;
        self.search_query.clear();
        self.unread.clear();
        self.form_error = None;
    }

    // --- Chat screen ---

    fn handle_chat_key(&mut self, key: KeyEvent) -> Result<()> {
        match self.input_mode {
            InputMode::Normal => match key.code {
                KeyCode::Char('q') => self.should_quit = true,
                KeyCode::Char('i') => self.input_mode = InputMode::Editing,
                KeyCode::Up => self.select_previous_contact(),
                KeyCode::Down => self.select_next_contact(),
                KeyCode::PageUp => {
                    let limit = self.conversation().len();
                    self.scroll_offset = (self.scroll_offset + 10).min(limit);
                }
                KeyCode::PageDown => {
                    self.scroll_offset = self.scroll_offset.saturating_sub(10);
                }
                _ => {}
            },
            InputMode::Editing => match key.code {
                KeyCode::Enter => {
                    self.submit_input()?;
                    self.input.clear();
                    self.cursor_position = 0;
                    self.input_mode = InputMode::Normal;
                }
                // The cursor is a char index; map it to a byte offset
                // before touching the string so multibyte input is safe.
                KeyCode::Char(c) => {
                    let idx = byte_index(&self.input, self.cursor_position);
                    self.input.insert(idx, c);
                    self.cursor_position += 1;
                }
                KeyCode::Backspace => {
                    if self.cursor_position > 0 {
                        let idx = byte_index(&self.input, self.cursor_position - 1);
                        self.input.remove(idx);
                        self.cursor_position -= 1;
                    }
                }
                KeyCode::Delete => {
                    if self.cursor_position < self.input.chars().count() {
                        let idx = byte_index(&self.input, self.cursor_position);
                        self.input.remove(idx);
                    }
                }
                KeyCode::Left => {
                    if self.cursor_position > 0 {
                        self.cursor_position -= 1;
                    }
                }
                KeyCode::Right => {
                    if self.cursor_position < self.input.chars().count() {
                        self.cursor_position += 1;
                    }
                }
                KeyCode::Home => self.cursor_position = 0,
                KeyCode::End => self.cursor_position = self.input.chars().count(),
                KeyCode::Esc => {
                    self.input.clear();
                    self.cursor_position = 0;
                    self.input_mode = InputMode::Normal;
                }
                _ => {}
            },
        }
        Ok(())
    }

    fn submit_input(&mut self) -> Result<()> {
        let input = self.input.trim().to_string();
        if input.is_empty() {
            return Ok(());
        }

        if input.starts_with('/') {
            self.handle_command(&input)?;
        } else {
            self.send_message(&input)?;
        }
        Ok(())
    }

    fn handle_command(&mut self, input: &str) -> Result<()> {
        let parts: Vec<&str> = input[1..].split_whitespace().collect();
        if parts.is_empty() {
            return Ok(());
        }

        match parts[0].to_lowercase().as_str() {
            "search" | "s" => {
                self.search_query = parts[1..].join(" ");
                self.selected_contact = 0;
                self.scroll_offset = 0;
                if self.search_query.is_empty() {
                    self.add_status_message("Search cleared".to_string());
                } else {
                    self.add_status_message(format!("Filtering contacts: {}", self.search_query));
                }
                self.mark_selected_read();
            }
            "profile" | "p" => {
                if parts.len() < 2 {
                    let summary = self
                        .current_user
                        .as_ref()
                        .map(|u| format!("Signed in as {} ({})", u.name, u.email))
                        .unwrap_or_else(|| "Not signed in".to_string());
                    self.add_status_message(summary);
                } else {
                    self.rename_profile(&parts[1..].join(" "))?;
                }
            }
            "clear" => {
                self.store.clear()?;
                self.scroll_offset = 0;
                self.add_status_message("Message history cleared".to_string());
            }
            "logout" => self.logout()?,
            "help" | "h" | "commands" => self.show_help(),
            "quit" | "q" | "exit" => self.should_quit = true,
            other => {
                self.add_status_message(format!(
                    "Unknown command: {}. Type /help for available commands.",
                    other
                ));
            }
        }
        Ok(())
    }

    fn send_message(&mut self, content: &str) -> Result<()> {
        let Some(me) = self.current_user.as_ref().map(|u| u.id.clone()) else {
            return Ok(());
        };
        let Some(other) = self.selected_contact_user().map(|c| c.id.clone()) else {
            self.add_status_message("No contact selected".to_string());
            return Ok(());
        };

        self.store.append(Message::text(&me, &other, content))?;
        self.scroll_offset = 0;
        store::simulate_reply(other, me, self.reply_tx.clone());
        Ok(())
    }

    fn rename_profile(&mut self, new_name: &str) -> Result<()> {
        let Some(user) = self.current_user.as_mut() else {
            return Ok(());
        };
        user.name = new_name.to_string();
        let updated = user.clone();
        self.auth.update_profile(&updated)?;
        self.add_status_message(format!("Profile name changed to {}", new_name));
        Ok(())
    }

    fn logout(&mut self) -> Result<()> {
        self.auth.logout()?;
        self.current_user = None;
        self.contacts.clear();
        self.unread.clear();
        self.search_query.clear();
        self.input.clear();
        self.cursor_position = 0;
        self.switch_screen(Screen::Login);
        Ok(())
    }

    fn show_help(&mut self) {
        let help_text = [
            "Chatterm Commands:",
            "/search <text> - Filter contacts by name or email (/search to clear)",
            "/profile <name> - Rename your profile (/profile shows the current one)",
            "/clear - Delete the whole message history",
            "/logout - Sign out and return to the login screen",
            "/help, /commands - Show this help",
            "/quit, /exit - Exit Chatterm",
            "",
            "Keyboard:",
            "i=enter input mode, Esc=back to normal mode, q=quit (normal mode)",
            "Up/Down=switch contact, Page Up/Down=scroll conversation",
            "Home/End=cursor start/end, Enter=send (input mode)",
        ];
        for line in help_text {
            self.add_status_message(line.to_string());
        }
    }

    // --- Selection and views ---

    /// Contacts after the sidebar search filter.
    pub fn visible_contacts(&self) -> Vec<&User> {
        contacts::filter_contacts(&self.contacts, &self.search_query)
    }

    pub fn selected_contact_user(&self) -> Option<&User> {
        self.visible_contacts().get(self.selected_contact).copied()
    }

    fn select_next_contact(&mut self) {
        let count = self.visible_contacts().len();
        if count > 0 && self.selected_contact + 1 < count {
            self.selected_contact += 1;
            self.scroll_offset = 0;
            self.mark_selected_read();
        }
    }

    fn select_previous_contact(&mut self) {
        if self.selected_contact > 0 {
            self.selected_contact -= 1;
            self.scroll_offset = 0;
            self.mark_selected_read();
        }
    }

    fn mark_selected_read(&mut self) {
        if let Some(id) = self.selected_contact_user().map(|c| c.id.clone()) {
            self.unread.remove(&id);
        }
    }

    /// The conversation with the selected contact, oldest first.
    pub fn conversation(&self) -> Vec<&Message> {
        match (&self.current_user, self.selected_contact_user()) {
            (Some(me), Some(other)) => self.store.conversation_for(&me.id, &other.id),
            _ => Vec::new(),
        }
    }

    /// Tail window of the conversation, offset back by scrolling.
    pub fn visible_messages(&self, height: usize) -> Vec<&Message> {
        let conversation = self.conversation();
        let end = conversation.len().saturating_sub(self.scroll_offset);
        let start = end.saturating_sub(height);
        conversation[start..end].to_vec()
    }

    pub fn unread_for(&self, contact_id: &str) -> usize {
        self.unread.get(contact_id).copied().unwrap_or(0)
    }

    pub fn add_status_message(&mut self, message: String) {
        self.status_messages
            .push(format!("[{}] {}", chrono::Local::now().format("%H:%M:%S"), message));

        // Keep only last 1000 status messages
        if self.status_messages.len() > 1000 {
            self.status_messages.remove(0);
        }
    }
}

/// Byte offset of the char at `char_pos`, or the string's end.
fn byte_index(s: &str, char_pos: usize) -> usize {
    s.char_indices().nth(char_pos).map_or(s.len(), |(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{DEMO_EMAIL, DEMO_PASSWORD, DEMO_USER_ID};

    fn test_app(dir: &std::path::Path) -> App {
        App::new(AppOptions {
            data_dir: dir.to_path_buf(),
            fresh: false,
            email: None,
            password: None,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn auto_login_enters_chat() {
        let tmp = tempfile::tempdir().unwrap();
        let app = App::new(AppOptions {
            data_dir: tmp.path().to_path_buf(),
            fresh: false,
            email: Some(DEMO_EMAIL.to_string()),
            password: Some(DEMO_PASSWORD.to_string()),
        })
        .unwrap();

        assert_eq!(app.screen, Screen::Chat);
        assert_eq!(app.current_user.as_ref().unwrap().id, DEMO_USER_ID);
        assert!(!app.contacts.is_empty());
    }

    #[tokio::test]
    async fn session_resumes_across_restarts() {
        let tmp = tempfile::tempdir().unwrap();
        let mut app = test_app(tmp.path());
        assert_eq!(app.screen, Screen::Login);
        let user = app.auth.login(DEMO_EMAIL, DEMO_PASSWORD).unwrap();
        app.enter_chat(user);
        drop(app);

        let app = test_app(tmp.path());
        assert_eq!(app.screen, Screen::Chat);
    }

    #[tokio::test]
    async fn reply_arrives_after_send() {
        tokio::time::pause();
        let tmp = tempfile::tempdir().unwrap();
        let mut app = test_app(tmp.path());
        let user = app.auth.login(DEMO_EMAIL, DEMO_PASSWORD).unwrap();
        app.enter_chat(user);

        let before = app.conversation().len();
        app.send_message("hello there").unwrap();
        assert_eq!(app.conversation().len(), before + 1);

        // Let the reply task register its timer before moving the clock.
        tokio::task::yield_now().await;
        tokio::time::advance(std::time::Duration::from_millis(3001)).await;
        tokio::task::yield_now().await;
        app.on_tick().await.unwrap();
        let conversation = app.conversation();
        assert_eq!(conversation.len(), before + 2);
        assert_eq!(conversation.last().unwrap().receiver_id, DEMO_USER_ID);
    }

    #[tokio::test]
    async fn unread_counts_replies_for_unselected_contacts() {
        tokio::time::pause();
        let tmp = tempfile::tempdir().unwrap();
        let mut app = test_app(tmp.path());
        let user = app.auth.login(DEMO_EMAIL, DEMO_PASSWORD).unwrap();
        app.enter_chat(user);

        let first_id = app.selected_contact_user().unwrap().id.clone();
        app.send_message("ping").unwrap();
        app.select_next_contact();
        assert_ne!(app.selected_contact_user().unwrap().id, first_id);

        // Let the reply task register its timer before moving the clock.
        tokio::task::yield_now().await;
        tokio::time::advance(std::time::Duration::from_millis(3001)).await;
        tokio::task::yield_now().await;
        app.on_tick().await.unwrap();
        assert_eq!(app.unread_for(&first_id), 1);

        app.select_previous_contact();
        assert_eq!(app.unread_for(&first_id), 0);
    }

    #[tokio::test]
    async fn search_filters_sidebar() {
        let tmp = tempfile::tempdir().unwrap();
        let mut app = test_app(tmp.path());
        let user = app.auth.login(DEMO_EMAIL, DEMO_PASSWORD).unwrap();
        app.enter_chat(user);

        app.input = "/search grace".to_string();
        app.submit_input().unwrap();
        let names: Vec<&str> = app.visible_contacts().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Grace Lee"]);

        app.input = "/search".to_string();
        app.submit_input().unwrap();
        assert_eq!(app.visible_contacts().len(), app.contacts.len());
    }

    #[tokio::test]
    async fn multibyte_input_edits_cleanly() {
        let tmp = tempfile::tempdir().unwrap();
        let mut app = test_app(tmp.path());
        let user = app.auth.login(DEMO_EMAIL, DEMO_PASSWORD).unwrap();
        app.enter_chat(user);

        let press = |code| Event::Key(KeyEvent::new(code, KeyModifiers::NONE));
        app.handle_input(press(KeyCode::Char('i'))).await.unwrap();
        assert_eq!(app.input_mode, InputMode::Editing);

        app.handle_input(press(KeyCode::Char('é'))).await.unwrap();
        app.handle_input(press(KeyCode::Char('a'))).await.unwrap();
        assert_eq!(app.input, "éa");
        assert_eq!(app.cursor_position, 2);

        // Step over the multibyte char and delete it.
        app.handle_input(press(KeyCode::Left)).await.unwrap();
        app.handle_input(press(KeyCode::Backspace)).await.unwrap();
        assert_eq!(app.input, "a");
        assert_eq!(app.cursor_position, 0);

        app.handle_input(press(KeyCode::Delete)).await.unwrap();
        assert_eq!(app.input, "");
        app.handle_input(press(KeyCode::Char('ü'))).await.unwrap();
        app.handle_input(press(KeyCode::End)).await.unwrap();
        assert_eq!(app.cursor_position, 1);
    }

    #[tokio::test]
    async fn logout_returns_to_login() {
        let tmp = tempfile::tempdir().unwrap();
        let mut app = test_app(tmp.path());
        let user = app.auth.login(DEMO_EMAIL, DEMO_PASSWORD).unwrap();
        app.enter_chat(user);

        app.input = "/logout".to_string();
        app.submit_input().unwrap();
        assert_eq!(app.screen, Screen::Login);
        assert!(app.current_user.is_none());
        assert!(app.auth.current_user().is_none());
    }
}
