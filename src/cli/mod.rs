pub mod commands;

use clap::{ Parser, Subcommand };

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- API Args ---
    /// Base URL of the storefront REST API, including the /api prefix.
    #[arg(long, env = "API_BASE_URL", default_value = "http://127.0.0.1:8000/api")]
    pub api_base_url: String,

    /// Origin of the chat WebSocket endpoint (ws:// or wss://).
    #[arg(long, env = "WS_BASE_URL", default_value = "ws://127.0.0.1:8000")]
    pub ws_base_url: String,

    /// Seconds before an API call fails with a timeout.
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value = "10")]
    pub request_timeout_secs: u64,

    // --- Client State Args ---
    /// Where tokens and favorites are kept (file, memory).
    #[arg(long, env = "STORAGE_TYPE", default_value = "file")]
    pub storage_type: String,

    /// Path of the JSON file used by the file storage backend.
    #[arg(long, env = "STORAGE_PATH", default_value = ".pet-market/storage.json")]
    pub storage_path: String,

    // --- General App Args ---
    /// Enable debug logging/output
    #[arg(long, env = "DEBUG", default_value = "false")]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Log in and store the issued tokens.
    Login {
        #[arg(long)]
        username: String,
        #[arg(long, env = "PET_MARKET_PASSWORD")]
        password: String,
    },
    /// Create an account.
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "PET_MARKET_PASSWORD")]
        password: String,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        location: Option<String>,
    },
    /// Forget the stored tokens.
    Logout,
    /// Ask for a password reset email.
    ResetPassword {
        #[arg(long)]
        email: String,
    },
    /// Show whether a valid session is stored.
    Status,
    /// Browse listings.
    Pets {
        #[arg(long)]
        breed: Option<String>,
        /// Category slug.
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        price_min: Option<String>,
        #[arg(long)]
        price_max: Option<String>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        active: Option<bool>,
        /// Only listings of this seller.
        #[arg(long)]
        seller: Option<u64>,
        #[arg(long)]
        page: Option<u32>,
    },
    /// Show one listing.
    Pet {
        id: u64,
    },
    /// List your own listings.
    MyPets,
    /// Publish a listing.
    CreatePet {
        #[command(flatten)]
        form: PetFormArgs,
    },
    /// Replace a listing.
    UpdatePet {
        id: u64,
        #[command(flatten)]
        form: PetFormArgs,
    },
    /// Remove a listing.
    DeletePet {
        id: u64,
    },
    /// Hide an active listing or bring a hidden one back.
    TogglePet {
        id: u64,
    },
    Categories,
    /// Show your profile and stats.
    Profile,
    /// Change profile fields.
    UpdateProfile {
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        bio: Option<String>,
        #[arg(long)]
        location: Option<String>,
    },
    /// Show a seller's public profile and active listings.
    Seller {
        id: u64,
    },
    /// List reviews left on a seller.
    Reviews {
        seller_id: u64,
    },
    /// Rate a seller.
    Review {
        seller_id: u64,
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=5))]
        rating: u8,
        #[arg(long, default_value = "")]
        text: String,
    },
    /// List conversations.
    Chats,
    /// Open (or create) the conversation with a seller.
    Contact {
        receiver_id: u64,
    },
    /// Join a conversation; lines typed on stdin are sent, /quit leaves.
    Chat {
        id: u64,
    },
    /// List forum topics.
    Forum,
    /// Show a forum topic with its comments.
    Topic {
        id: u64,
    },
    /// Start a forum topic.
    Post {
        #[arg(long)]
        title: String,
        #[arg(long)]
        content: String,
        #[arg(long)]
        category_id: Option<u64>,
    },
    Like {
        id: u64,
    },
    Comment {
        id: u64,
        text: String,
    },
    /// List saved favorites.
    Favorites,
    /// Add a listing to favorites, or remove it if already saved.
    Favorite {
        id: u64,
    },
}

#[derive(clap::Args, Debug, Clone)]
pub struct PetFormArgs {
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub breed: String,
    #[arg(long)]
    pub age: u32,
    #[arg(long, default_value = "")]
    pub description: String,
    #[arg(long)]
    pub price: Option<String>,
    #[arg(long)]
    pub category_id: Option<u64>,
    #[arg(long)]
    pub inactive: bool,
}
