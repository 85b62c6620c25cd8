//! hpctl - command-line client for the HealthPoint queue engine

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tabled::{Table, Tabled};

const DEFAULT_RPC_URL: &str = "http://127.0.0.1:9637";

#[derive(Parser)]
#[command(name = "hpctl")]
#[command(about = "HealthPoint queue and appointment CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// RPC server URL
    #[arg(long, env = "HEALTHPOINT_RPC_URL", default_value = DEFAULT_RPC_URL)]
    rpc_url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Issue a queue token
    Issue {
        /// Department id (e.g. GEN, PED)
        department: String,

        /// Serve ahead of non-priority patients
        #[arg(short, long)]
        priority: bool,
    },

    /// Call a waiting token in for service
    Call { token_id: String },

    /// Mark a token in service as completed
    Complete { token_id: String },

    /// Cancel a token
    Cancel { token_id: String },

    /// Remove a token from the queue entirely
    Delete { token_id: String },

    /// Show a department's waiting list
    Waiting { department: String },

    /// Recompute positions and waits for a department
    Recompute { department: String },

    /// Show one token
    Token { token_id: String },

    /// Per-department queue summary
    Status,

    /// List departments
    Departments,

    /// Book an appointment
    Book {
        #[arg(short, long)]
        department: String,

        /// Day of the appointment (YYYY-MM-DD)
        #[arg(long)]
        date: String,

        /// Time slot, e.g. "09:30 AM" (see `hpctl slots`)
        #[arg(short, long)]
        slot: String,

        #[arg(long)]
        patient_id: String,

        #[arg(long)]
        patient_name: String,

        #[arg(long)]
        contact: Option<String>,
    },

    /// Approve a pending appointment
    Approve { appointment_id: String },

    /// Cancel an appointment
    CancelAppointment { appointment_id: String },

    /// List appointments for a patient, or for a day
    Appointments {
        #[arg(long, conflicts_with_all = ["department", "date"])]
        patient: Option<String>,

        #[arg(long)]
        department: Option<String>,

        /// Day to list (YYYY-MM-DD)
        #[arg(long, required_unless_present = "patient")]
        date: Option<String>,
    },

    /// List bookable time slots
    Slots,

    /// Purge old finished records now
    Maintenance,
}

#[derive(Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: serde_json::Value,
    id: u64,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    #[allow(dead_code)]
    jsonrpc: String,
    #[allow(dead_code)]
    id: u64,
    result: Option<serde_json::Value>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

#[derive(Deserialize)]
struct Token {
    id: String,
    number: String,
    priority: bool,
    status: String,
    queue_position: u32,
    estimated_wait_minutes: u32,
}

#[derive(Tabled)]
struct TokenRow {
    #[tabled(rename = "Token")]
    number: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Position")]
    position: String,
    #[tabled(rename = "Est. wait")]
    wait: String,
    #[tabled(rename = "Priority")]
    priority: String,
    #[tabled(rename = "ID")]
    id: String,
}

impl From<Token> for TokenRow {
    fn from(t: Token) -> Self {
        let waiting = t.status == "WAITING";
        Self {
            number: t.number,
            status: t.status,
            position: if waiting {
                t.queue_position.to_string()
            } else {
                "-".to_string()
            },
            wait: if waiting {
                format!("{} min", t.estimated_wait_minutes)
            } else {
                "-".to_string()
            },
            priority: if t.priority { "yes" } else { "" }.to_string(),
            id: t.id,
        }
    }
}

#[derive(Deserialize)]
struct TokenMutation {
    token: Token,
    persisted: bool,
    warning: Option<String>,
}

#[derive(Deserialize, Tabled)]
struct StatsRow {
    #[tabled(rename = "Dept")]
    department_id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Waiting")]
    waiting: usize,
    #[tabled(rename = "Priority")]
    priority_waiting: usize,
    #[tabled(rename = "In progress")]
    in_progress: usize,
    #[tabled(rename = "Completed")]
    completed: usize,
    #[tabled(rename = "Next wait (min)")]
    next_standard_wait_minutes: u32,
    #[tabled(rename = "Load")]
    load: String,
    #[tabled(rename = "Health")]
    health: String,
}

#[derive(Deserialize, Tabled)]
struct DepartmentRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Minutes / patient")]
    baseline_service_minutes: u32,
}

#[derive(Deserialize)]
struct Appointment {
    id: String,
    department_id: String,
    date: String,
    slot: String,
    patient_name: String,
    status: String,
}

#[derive(Tabled)]
struct AppointmentRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Slot")]
    slot: String,
    #[tabled(rename = "Dept")]
    department_id: String,
    #[tabled(rename = "Patient")]
    patient_name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "ID")]
    id: String,
}

impl From<Appointment> for AppointmentRow {
    fn from(a: Appointment) -> Self {
        Self {
            date: a.date,
            slot: a.slot,
            department_id: a.department_id,
            patient_name: a.patient_name,
            status: a.status,
            id: a.id,
        }
    }
}

async fn call_rpc(url: &str, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
    let request = JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        method: method.to_string(),
        params,
        id: 1,
    };

    let client = reqwest::Client::new();
    let response: JsonRpcResponse = client
        .post(url)
        .json(&request)
        .send()
        .await
        .context("Failed to connect to daemon")?
        .json()
        .await
        .context("Failed to parse response")?;

    if let Some(error) = response.error {
        anyhow::bail!("RPC error ({}): {}", error.code, error.message);
    }

    response
        .result
        .ok_or_else(|| anyhow::anyhow!("No result in response"))
}

/// Print a token mutation result, including any durability warning
fn report_token(action: &str, result: serde_json::Value) -> Result<()> {
    let mutation: TokenMutation = serde_json::from_value(result)?;
    println!(
        "{}",
        format!("✓ {} {}", mutation.token.number, action).green().bold()
    );
    if let Some(warning) = &mutation.warning {
        println!("  {} {}", "⚠".yellow(), warning.yellow());
    } else if !mutation.persisted {
        println!("  {}", "⚠ Not yet saved".yellow());
    }
    println!();
    println!("{}", Table::new(vec![TokenRow::from(mutation.token)]));
    Ok(())
}

fn status_colored(status: &str) -> String {
    match status {
        "ON_TRACK" | "LOW" => status.green().to_string(),
        "DELAYED" | "HIGH" => status.red().to_string(),
        "MEDIUM" => status.yellow().to_string(),
        _ => status.to_string(),
    }
}

async fn transition(url: &str, token_id: &str, status: &str, action: &str) -> Result<()> {
    let params = json!({ "token_id": token_id, "status": status });
    let result = call_rpc(url, "queue.transition.v1", params).await?;
    report_token(action, result)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let url = cli.rpc_url.as_str();

    match cli.command {
        Commands::Issue {
            department,
            priority,
        } => {
            let params = json!({ "department_id": department, "priority": priority });
            let result = call_rpc(url, "queue.issue.v1", params).await?;
            report_token("issued", result)?;
        }

        Commands::Call { token_id } => {
            transition(url, &token_id, "IN_PROGRESS", "called in").await?;
        }

        Commands::Complete { token_id } => {
            transition(url, &token_id, "COMPLETED", "completed").await?;
        }

        Commands::Cancel { token_id } => {
            transition(url, &token_id, "CANCELLED", "cancelled").await?;
        }

        Commands::Delete { token_id } => {
            let result = call_rpc(url, "queue.delete.v1", json!({ "token_id": token_id })).await?;
            report_token("deleted", result)?;
        }

        Commands::Waiting { department } => {
            let result =
                call_rpc(url, "queue.waiting.v1", json!({ "department_id": department })).await?;
            let tokens: Vec<Token> = serde_json::from_value(result["tokens"].clone())?;

            println!(
                "{}",
                format!("{} waiting in {}", tokens.len(), department)
                    .cyan()
                    .bold()
            );
            if !tokens.is_empty() {
                let rows: Vec<TokenRow> = tokens.into_iter().map(TokenRow::from).collect();
                println!("{}", Table::new(rows));
            }
        }

        Commands::Recompute { department } => {
            let result =
                call_rpc(url, "queue.recompute.v1", json!({ "department_id": department }))
                    .await?;
            let tokens: Vec<Token> = serde_json::from_value(result["tokens"].clone())?;
            println!(
                "{}",
                format!("✓ {} estimates refreshed", department).green().bold()
            );
            if !tokens.is_empty() {
                let rows: Vec<TokenRow> = tokens.into_iter().map(TokenRow::from).collect();
                println!("{}", Table::new(rows));
            }
        }

        Commands::Token { token_id } => {
            let result = call_rpc(url, "queue.token.v1", json!({ "token_id": token_id })).await?;
            let token: Token = serde_json::from_value(result)?;
            println!("{}", Table::new(vec![TokenRow::from(token)]));
        }

        Commands::Status => {
            println!("{}", "Queue Status".cyan().bold());
            println!();

            match call_rpc(url, "queue.stats.v1", json!({})).await {
                Ok(result) => {
                    let mut rows: Vec<StatsRow> =
                        serde_json::from_value(result["departments"].clone())?;
                    for row in &mut rows {
                        row.load = status_colored(&row.load);
                        row.health = status_colored(&row.health);
                    }
                    println!("  {} {}", "RPC URL:".bold(), url);
                    println!("  {} {}", "Status:".bold(), "ONLINE".green());
                    println!();
                    println!("{}", Table::new(rows));
                }
                Err(e) => {
                    println!("  {} {}", "Status:".bold(), "ERROR".red());
                    println!("  {} {}", "Error:".bold(), e);
                }
            }
        }

        Commands::Departments => {
            let result = call_rpc(url, "departments.list.v1", json!({})).await?;
            let rows: Vec<DepartmentRow> = serde_json::from_value(result["departments"].clone())?;
            println!("{}", Table::new(rows));
        }

        Commands::Book {
            department,
            date,
            slot,
            patient_id,
            patient_name,
            contact,
        } => {
            let params = json!({
                "department_id": department,
                "date": date,
                "slot": slot,
                "patient_id": patient_id,
                "patient_name": patient_name,
                "contact": contact,
            });
            let result = call_rpc(url, "appointment.book.v1", params).await?;
            let appointment: Appointment = serde_json::from_value(result)?;

            println!("{}", "✓ Appointment requested".green().bold());
            println!();
            println!("{}", Table::new(vec![AppointmentRow::from(appointment)]));
        }

        Commands::Approve { appointment_id } => {
            let params = json!({ "appointment_id": appointment_id });
            call_rpc(url, "appointment.approve.v1", params).await?;
            println!(
                "{}",
                format!("✓ Appointment {} approved", appointment_id)
                    .green()
                    .bold()
            );
        }

        Commands::CancelAppointment { appointment_id } => {
            let params = json!({ "appointment_id": appointment_id });
            call_rpc(url, "appointment.cancel.v1", params).await?;
            println!(
                "{}",
                format!("✓ Appointment {} cancelled", appointment_id)
                    .green()
                    .bold()
            );
        }

        Commands::Appointments {
            patient,
            department,
            date,
        } => {
            let params = json!({
                "patient_id": patient,
                "department_id": department,
                "date": date,
            });
            let result = call_rpc(url, "appointment.list.v1", params).await?;
            let appointments: Vec<Appointment> =
                serde_json::from_value(result["appointments"].clone())?;

            if appointments.is_empty() {
                println!("{}", "No appointments found".yellow());
            } else {
                let rows: Vec<AppointmentRow> =
                    appointments.into_iter().map(AppointmentRow::from).collect();
                println!("{}", Table::new(rows));
            }
        }

        Commands::Slots => {
            let result = call_rpc(url, "appointment.slots.v1", json!({})).await?;
            let slots: Vec<String> = serde_json::from_value(result["slots"].clone())?;
            println!("{}", "Bookable slots".cyan().bold());
            for slot in slots {
                println!("  • {}", slot);
            }
        }

        Commands::Maintenance => {
            println!("{}", "Running maintenance...".cyan().bold());
            println!();

            match call_rpc(url, "admin.maintenance.v1", json!({})).await {
                Ok(result) => {
                    println!("  ✓ Maintenance completed");
                    println!();
                    println!(
                        "  {} {} tokens deleted",
                        "✓".green(),
                        result["tokens_deleted"]
                    );
                    println!(
                        "  {} {} cancelled appointments deleted",
                        "✓".green(),
                        result["appointments_deleted"]
                    );
                    println!(
                        "  {} {} tokens evicted from memory",
                        "✓".green(),
                        result["evicted_from_memory"]
                    );
                    if result["vacuumed"].as_bool().unwrap_or(false) {
                        println!("  {} VACUUM executed", "✓".green());
                    } else {
                        println!("  ○ VACUUM skipped (not needed)");
                    }
                }
                Err(e) => {
                    println!("  {} Maintenance failed: {}", "✗".red(), e);
                }
            }
        }
    }

    Ok(())
}
