//! Load data script for the movies API
//!
//! Populates the sled catalog with genres and a handful of movies.
//! Run: cargo run --bin load_data [data_dir]
//! Existing genres are overwritten; movies are appended.

use chrono::{Datelike, NaiveDate, Utc};
use std::collections::BTreeMap;

use movies_api::models::{Genre, Movie};
use movies_api::storage::Storage;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let data_dir = std::env::args().nth(1).unwrap_or_else(|| "movies_data".to_string());
    let storage = Storage::open(&data_dir)?;
    let now = Utc::now();

    let genres = [
        (1, "Drama"),
        (2, "Crime"),
        (3, "Action"),
        (4, "Comic Book"),
        (5, "Sci-Fi"),
        (6, "Mystery"),
        (7, "Adventure"),
        (8, "Comedy"),
        (9, "Romance"),
    ];
    for (id, name) in genres {
        storage.insert_genre(&Genre {
            id,
            genre_name: name.to_string(),
            created_at: now,
            updated_at: now,
        })?;
    }
    let genre_name = |id: i64| {
        genres
            .iter()
            .find(|(gid, _)| *gid == id)
            .map(|(_, name)| name.to_string())
            .unwrap_or_default()
    };

    let movies: [(&str, &str, (i32, u32, u32), i32, i32, &str, &[i64]); 4] = [
        (
            "The Shawshank Redemption",
            "Two imprisoned men bond over a number of years",
            (1994, 10, 14),
            142,
            5,
            "R",
            &[1],
        ),
        (
            "The Godfather",
            "The aging patriarch of an organized crime dynasty transfers control to his son",
            (1972, 3, 24),
            175,
            5,
            "R",
            &[1, 2],
        ),
        (
            "The Dark Knight",
            "The menace known as the Joker wreaks havoc on Gotham City",
            (2008, 7, 18),
            152,
            5,
            "PG-13",
            &[3, 2, 4],
        ),
        (
            "American Psycho",
            "A wealthy New York investment banking executive hides his alternate psychopathic ego",
            (2000, 4, 14),
            102,
            4,
            "R",
            &[1, 6],
        ),
    ];

    for (title, description, (y, m, d), runtime, rating, mpaa, genre_ids) in movies {
        let release_date = NaiveDate::from_ymd_opt(y, m, d);
        let id = storage.insert_movie(Movie {
            id: 0,
            title: title.to_string(),
            description: description.to_string(),
            year: release_date.map(|date| date.year()).unwrap_or(y),
            release_date,
            runtime,
            rating,
            mpaa_rating: mpaa.to_string(),
            poster: String::new(),
            genres: genre_ids
                .iter()
                .map(|gid| (*gid, genre_name(*gid)))
                .collect::<BTreeMap<_, _>>(),
            created_at: now,
            updated_at: now,
        })?;
        println!("Inserted movie {} ({})", id, title);
    }

    println!(
        "Catalog ready in {}: {} genres, {} movies",
        data_dir,
        storage.all_genres()?.len(),
        storage.all_movies(None)?.len()
    );
    Ok(())
}
