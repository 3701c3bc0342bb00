//! Line-oriented front end over the view models

use std::io::Write;

use reminders_core::{AuthUser, Result, Subscription};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use crate::navigation::Route;
use crate::state::AppState;
use crate::viewmodel::{
    AuthMode, AuthViewModel, DashboardState, DashboardViewModel, MemberBadge, MemberCard,
    MembershipChange, RoomSetupViewModel, RoomStats, RoomView, SetupMode,
};

const HELP: &str = "\
Commands:
  register <email> <password>   create an account
  login <email> <password>      sign in
  logout                        sign out
  create                        create a room
  join <code>                   join a room by invite code
  room                          show the current room
  share                         print the invite message
  copy                          copy the invite code to the clipboard
  leave                         leave the current room
  token <value>                 set the notification token
  help                          show this help
  quit                          exit";

enum Flow {
    Continue,
    Quit,
}

struct Shell {
    state: AppState,
    auth: AuthViewModel,
    dashboard: Option<DashboardViewModel>,
    route: Route,
    _auth_subscription: Subscription,
}

/// Run until `quit` or end of input
pub async fn run(state: AppState) -> Result<()> {
    let mut shell = Shell::new(state);
    shell.sync_route()?;
    println!("{HELP}");
    prompt(shell.route);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match shell.handle(&line) {
                    Ok(Flow::Quit) => break,
                    Ok(Flow::Continue) => {}
                    Err(e) => println!("Error: {e}"),
                }
                if let Err(e) = shell.sync_route() {
                    warn!(error = %e, "Failed to resolve route");
                }
                prompt(shell.route);
            }
            change = dashboard_change(&mut shell.dashboard) => {
                match change {
                    Some(change) => print_change(&change),
                    None => shell.dashboard = None,
                }
            }
        }
    }

    info!("Shell closed");
    Ok(())
}

async fn dashboard_change(dashboard: &mut Option<DashboardViewModel>) -> Option<MembershipChange> {
    match dashboard {
        Some(vm) => vm.next_change().await,
        None => std::future::pending().await,
    }
}

fn prompt(route: Route) {
    let label = match route {
        Route::Auth => "signed out",
        Route::RoomSetup => "no room",
        Route::RoomDashboard { .. } => "room",
    };
    print!("[{label}] > ");
    let _ = std::io::stdout().flush();
}

fn print_change(change: &MembershipChange) {
    for email in &change.joined {
        println!("* {email} joined the room");
    }
    for email in &change.left {
        println!("* {email} left the room");
    }
}

impl Shell {
    fn new(state: AppState) -> Self {
        let auth_subscription =
            state
                .auth
                .on_auth_state_changed(Box::new(|user: Option<AuthUser>| match user {
                    Some(user) => info!(uid = %user.uid, "Signed in"),
                    None => debug!("Signed out"),
                }));

        Self {
            auth: AuthViewModel::new(state.accounts.clone()),
            state,
            dashboard: None,
            route: Route::Auth,
            _auth_subscription: auth_subscription,
        }
    }

    /// Open or close the dashboard to match the current route
    fn sync_route(&mut self) -> Result<()> {
        let route = self.state.route()?;
        self.route = route;

        match (route, self.state.current_user()) {
            (Route::RoomDashboard { room_id }, Some(user)) => {
                let stale = self.dashboard.as_ref().map_or(true, |vm| vm.room_id() != room_id);
                if stale {
                    self.dashboard = Some(DashboardViewModel::open(&self.state, room_id, user.uid)?);
                }
            }
            _ => self.dashboard = None,
        }
        Ok(())
    }

    fn handle(&mut self, line: &str) -> Result<Flow> {
        let mut parts = line.split_whitespace();
        let Some(command) = parts.next() else {
            return Ok(Flow::Continue);
        };
        let args: Vec<&str> = parts.collect();

        // settle any snapshots that arrived while idle
        if let Some(vm) = self.dashboard.as_mut() {
            for change in vm.apply_pending() {
                print_change(&change);
            }
        }

        match (command, args.as_slice()) {
            ("help", _) => println!("{HELP}"),
            ("quit" | "exit", _) => return Ok(Flow::Quit),
            ("register", [email, password]) => self.authenticate(AuthMode::Register, email, password),
            ("login", [email, password]) => self.authenticate(AuthMode::Login, email, password),
            ("logout", []) => {
                self.state.accounts.logout()?;
                println!("Signed out");
            }
            ("create", []) => self.setup(SetupMode::Create, None),
            ("join", [code]) => self.setup(SetupMode::Join, Some(*code)),
            ("room", []) => self.show_room(),
            ("share", []) => match self.dashboard.as_ref().and_then(|vm| vm.share_text()) {
                Some(text) => println!("{text}"),
                None => println!("You are not in a room"),
            },
            ("copy", []) => match self.dashboard.as_ref().and_then(|vm| vm.copy_invite_code()) {
                Some(Ok(())) => println!("Invite code copied to clipboard"),
                Some(Err(e)) => println!("Could not copy the invite code: {e}"),
                None => println!("You are not in a room"),
            },
            ("leave", []) => match self.dashboard.as_mut() {
                Some(vm) => match vm.leave() {
                    Some(_) => println!("You left the room"),
                    None => println!("{}", vm.error().unwrap_or("Failed to leave room")),
                },
                None => println!("You are not in a room"),
            },
            ("token", [token]) => match self.state.current_user() {
                Some(user) => {
                    self.state
                        .profiles
                        .update_notification_token(user.uid, token)?;
                    println!("Notification token saved");
                }
                None => println!("Sign in first"),
            },
            _ => println!("Unknown command. Type 'help' for the list."),
        }
        Ok(Flow::Continue)
    }

    fn authenticate(&mut self, mode: AuthMode, email: &str, password: &str) {
        if self.route != Route::Auth {
            println!("Already signed in. Log out first.");
            return;
        }

        self.auth.set_mode(mode);
        self.auth.set_email(email);
        self.auth.set_password(password);
        match self.auth.submit() {
            Some(user) => println!("Signed in as {}", user.email),
            None => println!("{}", self.auth.error().unwrap_or("Authentication failed")),
        }
    }

    fn setup(&mut self, mode: SetupMode, code: Option<&str>) {
        let Some(user) = self.state.current_user() else {
            println!("Sign in first");
            return;
        };

        let mut vm = RoomSetupViewModel::new(self.state.rooms.clone(), user.uid);
        vm.set_mode(mode);
        if let Some(code) = code {
            vm.set_invite_input(code);
        }

        match vm.submit() {
            Some(_) => println!("You are in a room. Type 'room' to see it."),
            None => println!("{}", vm.error().unwrap_or("Something went wrong")),
        }
    }

    fn show_room(&self) {
        let Some(vm) = self.dashboard.as_ref() else {
            println!("You are not in a room");
            return;
        };

        match vm.state() {
            DashboardState::Loading => println!("Loading..."),
            DashboardState::NotFound => println!("Room not found"),
            DashboardState::Ready(view) => print_room(view),
        }
    }
}

fn print_room(view: &RoomView) {
    println!("Your Room");
    println!("  Invite code: {}", view.room.invite_code);
    println!("  {}", stats_line(&view.stats));
    for member in &view.members {
        println!("  {}", member_line(member));
    }
}

fn stats_line(stats: &RoomStats) -> String {
    format!(
        "Members: {}   Active tasks: {}   Created: {}",
        stats.member_count,
        stats.active_tasks,
        stats.created_label()
    )
}

fn member_line(member: &MemberCard) -> String {
    let you = if member.is_you { " (you)" } else { "" };
    let mark = if member.badge == MemberBadge::Creator { '*' } else { ' ' };
    format!(
        "{mark}[{}] {}{}  {}",
        member.initial,
        member.email,
        you,
        member.badge.label()
    )
}
