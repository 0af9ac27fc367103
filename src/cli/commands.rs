use log::{ debug, info, warn };
use std::collections::HashSet;
use std::error::Error;
use tokio::io::{ AsyncBufReadExt, BufReader };
use tokio::sync::broadcast::{ self, error::RecvError };

use super::{ Command, PetFormArgs };
use crate::api::ApiClient;
use crate::chat::{ ChatSession, SendOutcome };
use crate::favorites::Favorites;
use crate::models::auth::RegisterRequest;
use crate::models::chat::Message;
use crate::models::forum::NewTopic;
use crate::models::pet::{ Pet, PetFilter, PetForm };
use crate::models::profile::ProfileUpdate;

type CmdResult = Result<(), Box<dyn Error + Send + Sync>>;

pub struct App {
    pub api: ApiClient,
    pub favorites: Favorites,
    pub ws_base_url: String,
}

impl From<PetFormArgs> for PetForm {
    fn from(args: PetFormArgs) -> Self {
        PetForm {
            name: args.name,
            breed: args.breed,
            age: args.age,
            description: args.description,
            price: args.price,
            category_id: args.category_id,
            is_active: Some(!args.inactive),
        }
    }
}

fn print_pet(pet: &Pet) {
    let price = pet.price.as_deref().unwrap_or("-");
    let category = pet.category
        .as_ref()
        .map(|c| c.name.as_str())
        .unwrap_or("uncategorized");
    println!(
        "#{:<5} {:<20} {:<12} age {:<3} {:>10}  [{}]{}",
        pet.id,
        pet.name,
        pet.breed,
        pet.age,
        price,
        category,
        if pet.is_active { "" } else { " (inactive)" }
    );
}

fn print_message(message: &Message) {
    println!(
        "[{}] {}: {}",
        message.created_at.format("%H:%M"),
        message.sender.username,
        message.text
    );
}

pub async fn execute(app: &App, command: Command) -> CmdResult {
    let api = &app.api;
    match command {
        Command::Login { username, password } => {
            api.login(&username, &password).await?;
        }
        Command::Register { username, email, password, first_name, last_name, phone, location } => {
            let form = RegisterRequest {
                username,
                email,
                password_confirm: password.clone(),
                password,
                first_name,
                last_name,
                phone,
                location,
                bio: None,
            };
            api.register(&form).await?;
        }
        Command::Logout => {
            api.logout().await?;
            info!("Logged out");
        }
        Command::ResetPassword { email } => {
            api.request_password_reset(&email).await?;
        }
        Command::Status => {
            if api.session().is_authenticated().await {
                println!("Logged in");
            } else {
                println!("Not logged in");
            }
        }
        Command::Pets { breed, category, price_min, price_max, search, active, seller, page } => {
            let filter = PetFilter {
                breed,
                category,
                is_active: active,
                price_min,
                price_max,
                search,
                ordering: None,
                user: seller,
                page,
            };
            let pets = api.list_pets(&filter).await?;
            if pets.is_empty() {
                println!("No listings match these filters.");
            }
            pets.iter().for_each(print_pet);
        }
        Command::Pet { id } => {
            let pet = api.get_pet(id).await?;
            api.increment_views(id).await;
            print_pet(&pet);
            if let Some(owner) = &pet.user {
                println!("Seller: {}", owner);
            }
            println!("{}", pet.description);
            if app.favorites.is_favorite(id).await? {
                println!("★ in your favorites");
            }
        }
        Command::MyPets => {
            let pets = api.my_pets().await?;
            if pets.is_empty() {
                println!("You have no listings yet.");
            }
            pets.iter().for_each(print_pet);
        }
        Command::CreatePet { form } => {
            let pet = api.create_pet(&form.into()).await?;
            println!("Created listing #{}", pet.id);
        }
        Command::UpdatePet { id, form } => {
            let pet = api.update_pet(id, &form.into()).await?;
            print_pet(&pet);
        }
        Command::DeletePet { id } => {
            api.delete_pet(id).await?;
            println!("Deleted listing #{}", id);
        }
        Command::TogglePet { id } => {
            let state = api.toggle_active(id).await?;
            println!("Listing #{} is now {}", id, if state.is_active { "active" } else { "hidden" });
        }
        Command::Categories => {
            for category in api.list_categories().await? {
                println!("{} {:<20} ({})", category.icon, category.name, category.slug);
            }
        }
        Command::Profile => {
            let profile = api.get_profile().await?;
            println!("{} <{}>", profile.username, profile.email.as_deref().unwrap_or("-"));
            if let Some(location) = &profile.location {
                println!("Location: {}", location);
            }
            for (key, value) in api.profile_stats().await? {
                println!("  {}: {}", key, value);
            }
        }
        Command::UpdateProfile { email, first_name, last_name, phone, bio, location } => {
            let update = ProfileUpdate { email, first_name, last_name, phone, bio, location };
            let profile = api.update_profile(&update).await?;
            println!("Profile of {} updated", profile.username);
        }
        Command::Seller { id } => {
            let seller = api.get_user(id).await?;
            println!("{}", seller.username);
            let full_name = [seller.first_name.as_deref(), seller.last_name.as_deref()]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" ");
            if !full_name.trim().is_empty() {
                println!("{}", full_name);
            }
            if let Some(location) = &seller.location {
                println!("Location: {}", location);
            }
            if let Some(bio) = &seller.bio {
                println!("{}", bio);
            }
            let filter = PetFilter { user: Some(id), is_active: Some(true), ..Default::default() };
            let pets = api.list_pets(&filter).await?;
            if pets.is_empty() {
                println!("No active listings.");
            }
            pets.iter().for_each(print_pet);
        }
        Command::Reviews { seller_id } => {
            let reviews = api.seller_reviews(seller_id).await?;
            if reviews.is_empty() {
                println!("No reviews yet.");
            }
            for review in reviews {
                let author = review.author
                    .as_ref()
                    .map(|a| a.username.as_str())
                    .unwrap_or("anonymous");
                println!("{:<5} {}: {}", "★".repeat(review.rating as usize), author, review.text);
            }
        }
        Command::Review { seller_id, rating, text } => {
            api.add_review(seller_id, rating, &text).await?;
        }
        Command::Chats => {
            let chats = api.list_chats().await?;
            if chats.is_empty() {
                println!("No conversations yet. Contact a seller from a listing.");
            }
            for chat in chats {
                let last = chat.last_message
                    .as_ref()
                    .map(|m| format!("{}: {}", m.sender.username, m.text.chars().take(60).collect::<String>()))
                    .unwrap_or_else(|| "no messages".to_string());
                println!("#{:<5} {:<30} {}", chat.id, chat.participant_names(), last);
            }
        }
        Command::Contact { receiver_id } => {
            let chat = api.start_chat(receiver_id).await?;
            println!("Conversation #{} with {}", chat.id, chat.participant_names());
        }
        Command::Chat { id } => {
            run_chat(app, id).await?;
        }
        Command::Forum => {
            for topic in api.list_topics().await? {
                println!(
                    "#{:<5} {:<40} ♥ {:<4} 💬 {}",
                    topic.id,
                    topic.title,
                    topic.likes_count,
                    topic.comments_count
                );
            }
        }
        Command::Topic { id } => {
            let topic = api.get_topic(id).await?;
            println!("{}\n\n{}\n", topic.title, topic.content);
            for comment in api.topic_comments(id).await? {
                let author = comment.author
                    .as_ref()
                    .map(|a| a.username.as_str())
                    .unwrap_or("anonymous");
                println!("- {}: {}", author, comment.text);
            }
        }
        Command::Post { title, content, category_id } => {
            let topic = api.create_topic(&(NewTopic { title, content, category_id })).await?;
            println!("Created topic #{}", topic.id);
        }
        Command::Like { id } => {
            let state = api.like_topic(id).await?;
            println!("{}", state);
        }
        Command::Comment { id, text } => {
            api.add_comment(id, &text).await?;
            println!("Comment added");
        }
        Command::Favorites => {
            let favorites = app.favorites.list().await?;
            if favorites.is_empty() {
                println!("No favorites saved.");
            }
            favorites.iter().for_each(print_pet);
        }
        Command::Favorite { id } => {
            let pet = api.get_pet(id).await?;
            if app.favorites.toggle(&pet).await? {
                println!("Saved #{} to favorites", id);
            } else {
                println!("Removed #{} from favorites", id);
            }
        }
    }
    Ok(())
}

async fn run_chat(app: &App, chat_id: u64) -> CmdResult {
    let mut session = ChatSession::open(app.api.clone(), &app.ws_base_url, chat_id).await;
    if let Some(chat) = session.chat() {
        println!("Conversation #{} with {}", chat.id, chat.participant_names());
    }
    let updates = session.subscribe();
    let history = session.messages();
    history.iter().for_each(print_message);
    let shown: HashSet<u64> = history.iter().map(|m| m.id).collect();

    let printer = tokio::spawn(forward_updates(updates, shown, chat_id, print_message));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let result: CmdResult = loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break Ok(()),
            Err(e) => break Err(e.into()),
        };
        if line.trim() == "/quit" {
            break Ok(());
        }
        match session.send(&line).await {
            Ok(SendOutcome::Http(_)) => debug!("Chat {}: sent over HTTP", chat_id),
            Ok(_) => {}
            Err(e) => warn!("Message not sent: {}", e),
        }
    };

    session.close().await;
    printer.abort();
    result
}

/// Hands every live message not already in `shown` to `out`. A lagging
/// receiver skips what it missed and keeps going.
async fn forward_updates(
    mut updates: broadcast::Receiver<Message>,
    shown: HashSet<u64>,
    chat_id: u64,
    mut out: impl FnMut(&Message)
) {
    loop {
        match updates.recv().await {
            Ok(message) if shown.contains(&message.id) => {}
            Ok(message) => out(&message),
            Err(RecvError::Lagged(skipped)) => {
                warn!("Chat {}: {} live messages were not printed", chat_id, skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }
}
