use mongodb::error::Error as MongoError;
use thiserror::Error;

pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("missing MongoDB environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to save room `{room_id}`")]
    SaveRoom {
        room_id: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to load room `{room_id}`")]
    LoadRoom {
        room_id: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to append a message to room `{room_id}`")]
    AppendMessage {
        room_id: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to list messages of room `{room_id}`")]
    ListMessages {
        room_id: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to write vote of `{user_id}` in room `{room_id}`")]
    WriteVote {
        room_id: String,
        user_id: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to list votes of room `{room_id}`")]
    ListVotes {
        room_id: String,
        #[source]
        source: MongoError,
    },
}
