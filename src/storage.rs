use serde::{de::DeserializeOwned, Serialize};
use sled::{Db, Tree};

use crate::error::StorageError;
use crate::models::{Genre, Movie};

/// Movie catalog persisted in sled.
///
/// Records are JSON-encoded and keyed by their id as big-endian bytes, so the
/// last key of a tree is always the highest id.
#[derive(Clone)] // Sled handles are cheap to clone and thread-safe
pub struct Storage {
    db: Db,
    movie_tree: Tree,
    genre_tree: Tree,
}

impl Storage {
    /// Open or create the sled database at the given path.
    pub fn open(path: &str) -> Result<Self, StorageError> {
        Self::from_db(sled::open(path)?)
    }

    /// In-memory database removed on drop; used by tests and dry runs.
    pub fn temporary() -> Result<Self, StorageError> {
        Self::from_db(sled::Config::new().temporary(true).open()?)
    }

    fn from_db(db: Db) -> Result<Self, StorageError> {
        let movie_tree = db.open_tree("movies")?;
        let genre_tree = db.open_tree("genres")?;
        Ok(Self {
            db,
            movie_tree,
            genre_tree,
        })
    }

    pub fn get_movie(&self, id: i64) -> Result<Option<Movie>, StorageError> {
        self.movie_tree
            .get(key(id))?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    /// All movies ordered by title, optionally only those tagged with `genre_id`.
    pub fn all_movies(&self, genre_id: Option<i64>) -> Result<Vec<Movie>, StorageError> {
        let mut movies = scan::<Movie>(&self.movie_tree)?;
        if let Some(genre_id) = genre_id {
            movies.retain(|m| m.genres.contains_key(&genre_id));
        }
        movies.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(movies)
    }

    /// Store a new movie under the next free id and return that id.
    pub fn insert_movie(&self, mut movie: Movie) -> Result<i64, StorageError> {
        // Retry when a concurrent insert claims the same id first.
        let id = loop {
            let id = self.next_id(&self.movie_tree)?;
            movie.id = id;
            let claimed = self
                .movie_tree
                .compare_and_swap(key(id), None as Option<&[u8]>, Some(encode(&movie)?))?;
            if claimed.is_ok() {
                break id;
            }
        };
        self.db.flush()?;
        Ok(id)
    }

    pub fn update_movie(&self, movie: &Movie) -> Result<(), StorageError> {
        if !self.movie_tree.contains_key(key(movie.id))? {
            return Err(StorageError::MovieNotFound(movie.id));
        }
        self.movie_tree.insert(key(movie.id), encode(movie)?)?;
        self.db.flush()?;
        Ok(())
    }

    pub fn delete_movie(&self, id: i64) -> Result<(), StorageError> {
        if self.movie_tree.remove(key(id))?.is_none() {
            return Err(StorageError::MovieNotFound(id));
        }
        self.db.flush()?;
        Ok(())
    }

    /// All genres ordered by name.
    pub fn all_genres(&self) -> Result<Vec<Genre>, StorageError> {
        let mut genres = scan::<Genre>(&self.genre_tree)?;
        genres.sort_by(|a, b| a.genre_name.cmp(&b.genre_name));
        Ok(genres)
    }

    /// Upsert a genre under its own id.
    pub fn insert_genre(&self, genre: &Genre) -> Result<(), StorageError> {
        self.genre_tree.insert(key(genre.id), encode(genre)?)?;
        self.db.flush()?;
        Ok(())
    }

    fn next_id(&self, tree: &Tree) -> Result<i64, StorageError> {
        let last = match tree.last()? {
            Some((k, _)) => id_from_key(&k),
            None => 0,
        };
        Ok(last + 1)
    }
}

fn key(id: i64) -> [u8; 8] {
    id.to_be_bytes()
}

fn id_from_key(bytes: &[u8]) -> i64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    i64::from_be_bytes(buf)
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StorageError> {
    Ok(serde_json::to_vec(value)?)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StorageError> {
    Ok(serde_json::from_slice(bytes)?)
}

fn scan<T: DeserializeOwned>(tree: &Tree) -> Result<Vec<T>, StorageError> {
    tree.iter()
        .map(|item| {
            let (_, value) = item?;
            decode(&value)
        })
        .collect()
}
