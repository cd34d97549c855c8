//! MovieLens file readers.
//!
//! Two layouts are understood: the ml-100k distribution (`u.data` tab
//! separated, `u.item` pipe separated in latin-1, neither with a header) and
//! header-carrying CSV exports (`ratings.csv`, `movies.csv`) whose columns may
//! be spelled in snake_case or camelCase.

use super::RatingSource;
use crate::config::{DataConfig, FileFormat};
use crate::error::{Error, Result};
use crate::models::{ItemId, Movie, Rating, Timestamp, UserId};
use crate::utils::decode_latin1;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Genre flag columns of `u.item`, in file order.
pub const ML100K_GENRES: [&str; 19] = [
    "unknown",
    "Action",
    "Adventure",
    "Animation",
    "Children's",
    "Comedy",
    "Crime",
    "Documentary",
    "Drama",
    "Fantasy",
    "Film-Noir",
    "Horror",
    "Musical",
    "Mystery",
    "Romance",
    "Sci-Fi",
    "Thriller",
    "War",
    "Western",
];

const ML100K_GENRE_OFFSET: usize = 5;

#[derive(Debug, Deserialize)]
struct RatingRow {
    #[serde(alias = "userId")]
    user_id: UserId,
    #[serde(alias = "movieId", alias = "item_id", alias = "itemId")]
    movie_id: ItemId,
    rating: f64,
    timestamp: Timestamp,
}

impl From<RatingRow> for Rating {
    fn from(row: RatingRow) -> Self {
        Rating::new(row.user_id, row.movie_id, row.rating, row.timestamp)
    }
}

#[derive(Debug, Deserialize)]
struct MovieRow {
    #[serde(alias = "movieId", alias = "item_id", alias = "itemId")]
    movie_id: ItemId,
    title: String,
    #[serde(default)]
    genres: String,
}

impl From<MovieRow> for Movie {
    fn from(row: MovieRow) -> Self {
        Movie::new(row.movie_id, row.title, row.genres)
    }
}

/// Picks `|`, tab or `,` from whichever appears in the header line.
pub fn sniff_delimiter(data: &[u8]) -> u8 {
    let header = data.split(|&b| b == b'\n').next().unwrap_or_default();
    if header.contains(&b'|') {
        b'|'
    } else if header.contains(&b'\t') {
        b'\t'
    } else {
        b','
    }
}

/// `user \t item \t rating \t timestamp`, no header.
pub fn parse_ml100k_ratings(data: &[u8]) -> Result<Vec<Rating>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_reader(data);

    let mut ratings = Vec::new();
    for record in reader.deserialize::<(UserId, ItemId, f64, Timestamp)>() {
        let (user_id, item_id, rating, timestamp) = record?;
        ratings.push(Rating::new(user_id, item_id, rating, timestamp));
    }
    Ok(ratings)
}

/// `id|title|release date|video release date|IMDb URL|19 genre flags`, latin-1, no header.
pub fn parse_ml100k_movies(data: &[u8]) -> Result<Vec<Movie>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'|')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_reader(data);

    let mut movies = Vec::new();
    let mut record = csv::ByteRecord::new();
    while reader.read_byte_record(&mut record)? {
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        if record.len() < 2 {
            return Err(Error::MalformedRecord {
                line,
                reason: format!("expected at least 2 fields, found {}", record.len()),
            });
        }

        let item_id = decode_latin1(&record[0]).trim().parse::<ItemId>().map_err(|e| Error::MalformedRecord {
            line,
            reason: format!("bad movie id: {}", e),
        })?;
        let title = decode_latin1(&record[1]);
        let genres = ML100K_GENRES
            .iter()
            .enumerate()
            .filter(|(idx, _)| record.get(ML100K_GENRE_OFFSET + idx) == Some(b"1".as_slice()))
            .map(|(_, name)| *name)
            .collect::<Vec<_>>()
            .join("|");

        movies.push(Movie::new(item_id, title, genres));
    }
    Ok(movies)
}

/// Header-carrying ratings file, delimiter sniffed from the header.
pub fn parse_ratings_csv(data: &[u8]) -> Result<Vec<Rating>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(sniff_delimiter(data))
        .trim(csv::Trim::All)
        .from_reader(data);

    reader
        .deserialize::<RatingRow>()
        .map(|row| row.map(Rating::from).map_err(Error::from))
        .collect()
}

/// Header-carrying movies file, delimiter sniffed from the header.
pub fn parse_movies_csv(data: &[u8]) -> Result<Vec<Movie>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(sniff_delimiter(data))
        .trim(csv::Trim::All)
        .from_reader(data);

    reader
        .deserialize::<MovieRow>()
        .map(|row| row.map(Movie::from).map_err(Error::from))
        .collect()
}

pub fn parse_ratings(data: &[u8], format: FileFormat) -> Result<Vec<Rating>> {
    match format {
        FileFormat::Movielens100k => parse_ml100k_ratings(data),
        FileFormat::Csv => parse_ratings_csv(data),
    }
}

pub fn parse_movies(data: &[u8], format: FileFormat) -> Result<Vec<Movie>> {
    match format {
        FileFormat::Movielens100k => parse_ml100k_movies(data),
        FileFormat::Csv => parse_movies_csv(data),
    }
}

pub async fn read_ratings_file(path: &Path, format: FileFormat) -> Result<Vec<Rating>> {
    let data = tokio::fs::read(path).await?;
    let ratings = parse_ratings(&data, format)?;
    info!(path = %path.display(), count = ratings.len(), "Read ratings file");
    Ok(ratings)
}

pub async fn read_movies_file(path: &Path, format: FileFormat) -> Result<Vec<Movie>> {
    let data = tokio::fs::read(path).await?;
    let movies = parse_movies(&data, format)?;
    info!(path = %path.display(), count = movies.len(), "Read movies file");
    Ok(movies)
}

/// Rating store backed by MovieLens files on local disk.
#[derive(Debug, Clone)]
pub struct FileSource {
    ratings_path: PathBuf,
    ratings_format: FileFormat,
    movies_path: PathBuf,
    movies_format: FileFormat,
}

impl FileSource {
    pub fn new(
        ratings_path: impl Into<PathBuf>,
        ratings_format: FileFormat,
        movies_path: impl Into<PathBuf>,
        movies_format: FileFormat,
    ) -> Self {
        Self {
            ratings_path: ratings_path.into(),
            ratings_format,
            movies_path: movies_path.into(),
            movies_format,
        }
    }

    pub fn from_config(config: &DataConfig) -> Self {
        Self::new(
            config.ratings_path.clone(),
            config.ratings_format,
            config.movies_path.clone(),
            config.movies_format,
        )
    }
}

#[async_trait]
impl RatingSource for FileSource {
    async fn load_ratings(&self) -> Result<Vec<Rating>> {
        read_ratings_file(&self.ratings_path, self.ratings_format).await
    }

    async fn load_movies(&self) -> Result<Vec<Movie>> {
        read_movies_file(&self.movies_path, self.movies_format).await
    }

    fn describe(&self) -> String {
        format!(
            "files(ratings={}, movies={})",
            self.ratings_path.display(),
            self.movies_path.display()
        )
    }
}
