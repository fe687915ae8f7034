use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "task-cli")]
#[command(about = "Command-line client for the task tracker API", long_about = None)]
struct Cli {
    #[arg(short, long, env = "TASK_TRACKER_URL", default_value = "http://localhost:8080")]
    url: String,

    /// Bearer token for authenticated commands.
    #[arg(short, long, env = "TASK_TRACKER_TOKEN")]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account and print its token
    Register {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Exchange credentials for a token
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Revoke the current token
    Logout,
    /// List your tasks
    Tasks,
    /// Create a task
    AddTask {
        title: String,
        #[arg(long)]
        description: Option<String>,
        /// LOW, MEDIUM or HIGH
        #[arg(long)]
        priority: Option<String>,
        /// YYYY-MM-DD
        #[arg(long)]
        due: Option<String>,
    },
    /// Mark a task completed
    Complete { id: String },
    /// Show service status (admin only)
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let mut headers = HeaderMap::new();
    if let Some(token) = &cli.token {
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token))?,
        );
    }

    let res = match cli.command {
        Commands::Register {
            first_name,
            last_name,
            email,
            password,
        } => {
            client
                .post(format!("{}/auth/register", base))
                .json(&json!({
                    "firstName": first_name,
                    "lastName": last_name,
                    "email": email,
                    "password": password,
                }))
                .send()
                .await?
        }
        Commands::Login { email, password } => {
            client
                .post(format!("{}/auth/authenticate", base))
                .json(&json!({ "email": email, "password": password }))
                .send()
                .await?
        }
        Commands::Logout => {
            client
                .post(format!("{}/auth/logout", base))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Tasks => {
            client
                .get(format!("{}/tasks", base))
                .headers(headers)
                .send()
                .await?
        }
        Commands::AddTask {
            title,
            description,
            priority,
            due,
        } => {
            let mut body = json!({ "title": title });
            if let Some(description) = description {
                body["description"] = json!(description);
            }
            if let Some(priority) = priority {
                body["priority"] = json!(priority.to_uppercase());
            }
            if let Some(due) = due {
                body["dueDate"] = json!(due);
            }
            client
                .post(format!("{}/tasks", base))
                .headers(headers)
                .json(&body)
                .send()
                .await?
        }
        Commands::Complete { id } => {
            client
                .put(format!("{}/tasks/{}", base, id))
                .headers(headers)
                .json(&json!({ "completed": true }))
                .send()
                .await?
        }
        Commands::Status => {
            client
                .get(format!("{}/admin/status", base))
                .headers(headers)
                .send()
                .await?
        }
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let text = res.text().await?;
    if text.is_empty() {
        println!("{}", status);
        return Ok(());
    }
    let json: Value = serde_json::from_str(&text)?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
