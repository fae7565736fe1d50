//! The demo script: sign in, create an account, change it, read it back,
//! list accounts, wait for the user, then delete what was created.

use crate::api::{Query, Record, RecordClient};
use anyhow::{Context, Result};
use colored::*;
use crossterm::event::{self, Event, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use is_terminal::IsTerminal;
use std::fmt;
use std::io::{BufRead, Write};
use uuid::Uuid;

pub const ACCOUNT: &str = "account";
pub const INITIAL_NAME: &str = "Nightmare Coffee";
pub const UPDATED_NAME: &str = "Fourth Coffee";
pub const UPDATED_POSTAL_CODE: &str = "98052";
pub const PAUSE_MESSAGE: &str = "Press any key to undo environment data changes.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemoStep {
    WhoAmI,
    Create,
    Update,
    Retrieve,
    List,
    Confirm,
    Delete,
    Done,
}

impl DemoStep {
    pub fn next(self) -> Self {
        match self {
            DemoStep::WhoAmI => DemoStep::Create,
            DemoStep::Create => DemoStep::Update,
            DemoStep::Update => DemoStep::Retrieve,
            DemoStep::Retrieve => DemoStep::List,
            DemoStep::List => DemoStep::Confirm,
            DemoStep::Confirm => DemoStep::Delete,
            DemoStep::Delete | DemoStep::Done => DemoStep::Done,
        }
    }
}

impl fmt::Display for DemoStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DemoStep::WhoAmI => "WhoAmI",
            DemoStep::Create => "create account",
            DemoStep::Update => "update account",
            DemoStep::Retrieve => "retrieve account",
            DemoStep::List => "list accounts",
            DemoStep::Confirm => "confirm cleanup",
            DemoStep::Delete => "delete account",
            DemoStep::Done => "done",
        };
        write!(f, "{}", name)
    }
}

/// Blocks until the user is ready for the cleanup.
pub trait Pause {
    fn wait(&mut self) -> Result<()>;
}

/// Single key press on a terminal, a line of input otherwise.
pub struct TerminalPause;

impl Pause for TerminalPause {
    fn wait(&mut self) -> Result<()> {
        if !std::io::stdin().is_terminal() {
            return wait_for_line(&mut std::io::stdin().lock());
        }

        enable_raw_mode()?;
        let result = loop {
            match event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => break Ok(()),
                Ok(_) => continue,
                Err(e) => break Err(e),
            }
        };
        disable_raw_mode()?;
        result?;
        Ok(())
    }
}

/// Block until a line arrives. End of input is an error, so a closed stdin
/// never stands in for confirmation.
fn wait_for_line<R: BufRead>(input: &mut R) -> Result<()> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        anyhow::bail!("input closed before the pause was acknowledged");
    }
    Ok(())
}

/// For `--yes`: carry on without waiting.
pub struct NoPause;

impl Pause for NoPause {
    fn wait(&mut self) -> Result<()> {
        Ok(())
    }
}

/// What a completed run did.
#[derive(Debug, Clone, PartialEq)]
pub struct DemoReport {
    pub user_id: Uuid,
    pub account_id: Uuid,
    pub listed: usize,
}

/// Runs the demo over one [`RecordClient`], which it owns for the whole run.
pub struct DemoDriver {
    client: RecordClient,
    pause: Box<dyn Pause>,
    top: u32,
    step: DemoStep,
}

impl DemoDriver {
    pub fn new(client: RecordClient, pause: Box<dyn Pause>) -> Self {
        Self {
            client,
            pause,
            top: 10,
            step: DemoStep::WhoAmI,
        }
    }

    /// Maximum number of accounts listed
    pub fn with_top(mut self, top: u32) -> Self {
        self.top = top;
        self
    }

    /// The step currently running, or the one that failed.
    pub fn step(&self) -> DemoStep {
        self.step
    }

    /// Run every step in order, writing progress to `out`. The first failure
    /// stops the run; nothing already done is undone. The session is closed
    /// either way.
    pub async fn run<W: Write>(&mut self, out: &mut W) -> Result<DemoReport> {
        log::info!("Starting demo over {} transport", self.client.service_name());
        let result = self.run_steps(out).await;
        self.client.close();

        match &result {
            Ok(_) => log::info!("Demo finished"),
            Err(e) => log::error!("Demo stopped at {}: {:#}", self.step, e),
        }
        result
    }

    async fn run_steps<W: Write>(&mut self, out: &mut W) -> Result<DemoReport> {
        self.step = DemoStep::WhoAmI;
        let identity = self
            .client
            .who_am_i()
            .await
            .with_context(|| format!("Step '{}' failed", self.step))?;
        writeln!(out, "User ID is {}.", identity.user_id.to_string().cyan())?;

        self.advance();
        let mut account = Record::new(ACCOUNT).field("name", INITIAL_NAME);
        let account_id = self
            .client
            .create(&mut account)
            .await
            .with_context(|| format!("Step '{}' failed", self.step))?;
        writeln!(out, "{} account {} ({})", "Created".green(), INITIAL_NAME, account_id)?;

        self.advance();
        let changes = Record::with_id(ACCOUNT, account_id)
            .field("name", UPDATED_NAME)
            .field("address2_postalcode", UPDATED_POSTAL_CODE);
        self.client
            .update(&changes)
            .await
            .with_context(|| format!("Step '{}' failed", self.step))?;
        writeln!(out, "{} account {}", "Updated".green(), account_id)?;

        self.advance();
        let retrieved = self
            .client
            .retrieve(ACCOUNT, account_id, &["name", "address2_postalcode"])
            .await
            .with_context(|| format!("Step '{}' failed", self.step))?;
        writeln!(
            out,
            "Retrieved account name: {}, postal code: {}",
            retrieved.get_str("name").unwrap_or_default().bold(),
            retrieved.get_str("address2_postalcode").unwrap_or_default().bold()
        )?;

        self.advance();
        let query = Query::new(ACCOUNT).select(&["name"]).top(self.top);
        let records = self
            .client
            .query(&query)
            .await
            .with_context(|| format!("Step '{}' failed", self.step))?;
        writeln!(out, "Records:")?;
        let mut listed = 0;
        for record in records {
            let id = record.id().map(|id| id.to_string()).unwrap_or_default();
            writeln!(out, "{}, {}", record.get_str("name").unwrap_or_default(), id.dimmed())?;
            listed += 1;
        }

        self.advance();
        writeln!(out, "{}", PAUSE_MESSAGE.yellow())?;
        out.flush()?;
        self.pause
            .wait()
            .with_context(|| format!("Step '{}' failed", self.step))?;

        self.advance();
        self.client
            .delete(ACCOUNT, account_id)
            .await
            .with_context(|| format!("Step '{}' failed", self.step))?;
        writeln!(out, "{} account {}", "Deleted".green(), account_id)?;

        self.advance();
        Ok(DemoReport {
            user_id: identity.user_id,
            account_id,
            listed,
        })
    }

    fn advance(&mut self) {
        self.step = self.step.next();
        log::debug!("Step: {}", self.step);
    }
}
