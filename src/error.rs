use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::components::Pos;

/// Structural errors raised while a grid is being populated.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GridError {
    #[error("row {row} has {found} columns, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("tile ({row}, {col}) is outside the {rows}x{cols} grid")]
    OutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },
}

/// Fatal errors raised while loading or constructing a level.
#[derive(Debug, Error)]
pub enum LevelError {
    #[error("failed to read level file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error("at least one ghost must be spawned")]
    NoGhosts,
    #[error("cannot spawn {requested} ghosts, at most {max} are allowed")]
    TooManyGhosts { requested: usize, max: usize },
    #[error("level has no player spawn ('S')")]
    MissingPlayer,
    #[error("level has a second player spawn at {second:?}, first was {first:?}")]
    DuplicatePlayer { first: Pos, second: Pos },
    #[error("level has no ghost spawn ('G')")]
    MissingGhostSpawn,
    #[error("level has a second ghost spawn at {second:?}, first was {first:?}")]
    DuplicateGhostSpawn { first: Pos, second: Pos },
    #[error("level has no pellets, so it can never be won")]
    NoPellets,
    #[error("failed to spawn thread {name}")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },
}

pub type LevelResult<T> = Result<T, LevelError>;
