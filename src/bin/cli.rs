use clap::{Parser, Subcommand};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::json;
use std::fs;
use std::io;
use std::path::Path;

use movies_api::auth::hash_password;

const TOKEN_FILE: &str = ".movies_token";

#[derive(Parser)]
#[command(name = "movies-cli")]
#[command(about = "CLI for the movies API", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, default_value = "http://localhost:4000")]
    url: String,
}

#[derive(Subcommand)]
enum Commands {
    Signin {
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
    },
    Status,
    Movies {
        #[arg(short, long)]
        genre: Option<i64>,
    },
    Movie {
        #[arg(short, long)]
        id: i64,
    },
    Genres,
    EditMovie {
        /// 0 creates a new movie
        #[arg(short, long, default_value = "0")]
        id: String,
        #[arg(short, long)]
        title: String,
        #[arg(short, long, default_value = "")]
        description: String,
        /// YYYY-MM-DD
        #[arg(long, default_value = "")]
        release_date: String,
        #[arg(long)]
        runtime: String,
        #[arg(long)]
        rating: String,
        #[arg(long, default_value = "")]
        mpaa_rating: String,
    },
    DeleteMovie {
        #[arg(short, long)]
        id: i64,
    },
    /// Print a bcrypt hash suitable for ADMIN_PASSWORD_HASH
    HashPassword {
        #[arg(short, long)]
        password: String,
        #[arg(short, long, default_value_t = 12)]
        cost: u32,
    },
    Signout,
}

#[derive(Deserialize)]
struct SigninResponse {
    response: String,
}

fn with_token(request: RequestBuilder) -> RequestBuilder {
    match fs::read_to_string(TOKEN_FILE) {
        Ok(token) => request.bearer_auth(token.trim()),
        Err(_) => request,
    }
}

/// Delete the saved token. Returns whether there was one; a missing file is not an error.
fn remove_token(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = Client::new();

    match cli.command {
        Commands::Signin { email, password } => {
            let res = client
                .post(format!("{}/v1/signin", cli.url))
                .json(&json!({ "email": email, "password": password }))
                .send()
                .await?;
            if res.status().is_success() {
                let body: SigninResponse = res.json().await?;
                fs::write(TOKEN_FILE, body.response)?;
                println!("Signed in. Token saved to {}", TOKEN_FILE);
            } else {
                println!("Signin failed: {}", res.text().await?);
            }
        }
        Commands::Status => {
            let res = client.get(format!("{}/status", cli.url)).send().await?;
            println!("Response: {}", res.text().await?);
        }
        Commands::Movies { genre } => {
            let url = match genre {
                Some(genre_id) => format!("{}/v1/movies/{}", cli.url, genre_id),
                None => format!("{}/v1/movies", cli.url),
            };
            let res = client.get(url).send().await?;
            println!("Response: {}", res.text().await?);
        }
        Commands::Movie { id } => {
            let res = client.get(format!("{}/v1/movie/{}", cli.url, id)).send().await?;
            println!("Response: {}", res.text().await?);
        }
        Commands::Genres => {
            let res = client.get(format!("{}/v1/genres", cli.url)).send().await?;
            println!("Response: {}", res.text().await?);
        }
        Commands::EditMovie {
            id,
            title,
            description,
            release_date,
            runtime,
            rating,
            mpaa_rating,
        } => {
            let res = with_token(client.post(format!("{}/v1/admin/editmovie", cli.url)))
                .json(&json!({
                    "id": id,
                    "title": title,
                    "description": description,
                    "release_date": release_date,
                    "runtime": runtime,
                    "rating": rating,
                    "mpaa_rating": mpaa_rating
                }))
                .send()
                .await?;
            println!("Response: {}", res.text().await?);
        }
        Commands::DeleteMovie { id } => {
            let res = with_token(client.get(format!("{}/v1/admin/deletemovie/{}", cli.url, id)))
                .send()
                .await?;
            println!("Response: {}", res.text().await?);
        }
        Commands::HashPassword { password, cost } => {
            println!("{}", hash_password(&password, cost)?);
        }
        Commands::Signout => {
            if remove_token(Path::new(TOKEN_FILE))? {
                println!("Signed out (token removed).");
            } else {
                println!("Not signed in (no token found).");
            }
        }
    }

    Ok(())
}
