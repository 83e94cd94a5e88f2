use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "gaze", about = "Gaze face recognition CLI")]
struct Cli {
    /// Daemon base URL.
    #[arg(long, env = "GAZE_SERVER", default_value = "http://127.0.0.1:5000")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a person from one or more sample images
    Register {
        /// Display name for the identity
        #[arg(short, long)]
        name: String,
        /// Sample image files (jpeg/png)
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },
    /// Recognize faces in an image
    Recognize {
        image: PathBuf,
    },
    /// List registered identities
    List,
    /// Remove a registered identity by id
    Remove {
        id: String,
    },
    /// Remove all registered identities
    Clear,
    /// Show daemon health
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Register { name, images } => {
            let mut payloads = Vec::with_capacity(images.len());
            for path in &images {
                payloads.push(encode_image(path)?);
            }

            let response = post_json(
                &client,
                &format!("{}/api/register", cli.server),
                json!({ "name": name, "images": payloads }),
            )
            .await?;

            println!(
                "{}",
                response["message"].as_str().unwrap_or("registered")
            );
            println!("id: {}", response["face_id"].as_str().unwrap_or("?"));
        }
        Commands::Recognize { image } => {
            let response = post_json(
                &client,
                &format!("{}/api/recognize", cli.server),
                json!({ "image": encode_image(&image)? }),
            )
            .await?;

            let faces = response["faces"].as_array().cloned().unwrap_or_default();
            if faces.is_empty() {
                println!("No faces found");
            }
            for face in faces {
                let name = face["name"].as_str().unwrap_or("Unknown");
                let confidence = face["confidence"].as_f64().unwrap_or(0.0);
                let loc = &face["location"];
                println!(
                    "{name} (confidence {confidence:.2}) at top={} right={} bottom={} left={}",
                    loc["top"], loc["right"], loc["bottom"], loc["left"]
                );
            }
        }
        Commands::List => {
            let response: Value = client
                .get(format!("{}/api/faces", cli.server))
                .send()
                .await?
                .json()
                .await?;

            let faces = response["faces"].as_array().cloned().unwrap_or_default();
            if faces.is_empty() {
                println!("No identities registered");
            }
            for face in faces {
                println!(
                    "{}  {}  {}",
                    face["id"].as_str().unwrap_or("?"),
                    face["name"].as_str().unwrap_or("?"),
                    face["timestamp"].as_str().unwrap_or("?")
                );
            }
        }
        Commands::Remove { id } => {
            let response: Value = client
                .delete(format!("{}/api/faces/{id}", cli.server))
                .send()
                .await?
                .json()
                .await?;
            println!("{}", response["message"].as_str().unwrap_or("removed"));
        }
        Commands::Clear => {
            let response: Value = client
                .delete(format!("{}/api/faces", cli.server))
                .send()
                .await?
                .json()
                .await?;
            println!("{}", response["message"].as_str().unwrap_or("cleared"));
        }
        Commands::Health => {
            let response: Value = client
                .get(format!("{}/api/health", cli.server))
                .send()
                .await?
                .json()
                .await?;
            println!(
                "status: {}, registered faces: {}",
                response["status"].as_str().unwrap_or("?"),
                response["registered_faces"]
            );
        }
    }

    Ok(())
}

/// POST a JSON body and bail with the server's error message on failure.
async fn post_json(client: &reqwest::Client, url: &str, body: Value) -> Result<Value> {
    let response: Value = client.post(url).json(&body).send().await?.json().await?;
    if !response["success"].as_bool().unwrap_or(false) {
        bail!(
            "server error: {}",
            response["error"].as_str().unwrap_or("unknown error")
        );
    }
    Ok(response)
}

/// Read an image file and base64-encode it for the wire.
fn encode_image(path: &Path) -> Result<String> {
    let bytes =
        std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(BASE64.encode(bytes))
}
