use std::{io::Write, path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use kiosk_core::{
    resolve_session_row, settings::Settings, today_string, CellWriter, ColumnValues, PendingWrite,
};
use sheets_integration::{GoogleSheetsConnector, SheetConnector, SheetSession};
use shared::domain::{CellAddress, SessionRow};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long)]
    config: Option<PathBuf>,
    /// Date text to look up instead of today's date.
    #[arg(long)]
    today: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the date index and the row resolved for today.
    Dates,
    /// Mark one student by display name.
    Mark {
        name: String,
        #[arg(long)]
        absent: bool,
    },
    /// Mark students present by name until `q`.
    Interactive,
}

struct Sheet {
    session: Arc<dyn SheetSession>,
    writer: CellWriter,
    settings: Settings,
    today: String,
}

impl Sheet {
    async fn open(settings: Settings, today: Option<String>) -> Result<Self> {
        let connector = GoogleSheetsConnector::new(settings.sheets_config()?)
            .context("failed to build the sheets http client")?;
        let session = connector
            .connect()
            .await
            .context("failed to connect to the spreadsheet")?;
        let today = today
            .unwrap_or_else(|| today_string(Local::now().date_naive(), &settings.date_format));
        Ok(Self {
            session,
            writer: settings.cell_writer(),
            settings,
            today,
        })
    }

    async fn index(&self) -> Result<ColumnValues> {
        let range = self.settings.date_index_range()?;
        self.writer
            .read_index(self.session.as_ref(), &range)
            .await
            .with_context(|| format!("failed to read date index {range}"))
    }

    async fn lesson_row(&self) -> Result<SessionRow> {
        match resolve_session_row(&self.today, &self.index().await?) {
            Some(row) => Ok(row),
            None => bail!("no lesson on {}", self.today),
        }
    }

    async fn mark(&self, row: SessionRow, name: &str, present: bool) -> Result<Option<CellAddress>> {
        let roster = self.settings.roster()?;
        let Some(student) = roster.find_by_name(name) else {
            return Ok(None);
        };
        let value = if present {
            &self.settings.present_value
        } else {
            &self.settings.absent_value
        };
        let write = PendingWrite {
            address: CellAddress::for_student(student, row),
            value: value.clone(),
        };
        self.writer
            .write_mark(self.session.as_ref(), &write)
            .await
            .with_context(|| format!("failed to update {}", write.address))?;
        Ok(Some(write.address))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();
    let cli = Cli::parse();
    let settings =
        kiosk_core::load_settings(cli.config.as_deref()).context("failed to load settings")?;
    let sheet = Sheet::open(settings, cli.today).await?;

    match cli.command {
        Command::Dates => {
            let index = sheet.index().await?;
            for (row, value) in index.iter() {
                println!("{:>4}  {}", row.0, value.unwrap_or(""));
            }
            match resolve_session_row(&sheet.today, &index) {
                Some(row) => println!("lesson for {} is row {row}", sheet.today),
                None => println!("no lesson on {}", sheet.today),
            }
        }
        Command::Mark { name, absent } => {
            let row = sheet.lesson_row().await?;
            match sheet.mark(row, &name, !absent).await? {
                Some(address) => println!("updated {address}"),
                None => bail!("No student with that name"),
            }
        }
        Command::Interactive => {
            let row = sheet.lesson_row().await?;
            println!("taking roll for {} (row {row}), q to quit", sheet.today);
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                print!("name: ");
                std::io::stdout().flush()?;
                let Some(line) = lines.next_line().await? else {
                    break;
                };
                let name = line.trim();
                if name.eq_ignore_ascii_case("q") {
                    break;
                }
                if name.is_empty() {
                    continue;
                }
                match sheet.mark(row, name, true).await {
                    Ok(Some(address)) => println!("marked {name} present ({address})"),
                    Ok(None) => println!("No student with that name"),
                    Err(error) => println!("{error:#}"),
                }
            }
        }
    }

    Ok(())
}
