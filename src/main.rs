use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use toca::config::{self, Config};
use toca::db::{self, PostStore, SqliteStore};
use toca::edit::EditForm;
use toca::format;
use toca::input::DraftInput;
use toca::model::{GenderPreference, PersistedPost, PostFilter, PostType};
use toca::pipeline::{FailureReason, Outcome, SubmissionPipeline};
use toca::session::SessionProvider;
use toca::wizard::{Step, ValidationErrors, Wizard};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create a post from a YAML draft, walking the wizard steps
    Create {
        /// Draft file
        draft: PathBuf,
    },
    /// Apply the keys of a YAML draft to one of your posts
    Edit {
        post_id: Uuid,
        draft: PathBuf,
    },
    /// Print a post and its images
    Show { post_id: Uuid },
    /// List active posts
    List {
        #[arg(long = "type")]
        post_type: Option<PostType>,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        min_price: Option<f64>,
        #[arg(long)]
        max_price: Option<f64>,
        #[arg(long)]
        gender: Option<GenderPreference>,
        /// Only your own posts (including expired ones)
        #[arg(long)]
        mine: bool,
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Delete one image of a post
    DeleteImage { image_id: Uuid },
    /// Delete one of your posts with all its images
    DeletePost { post_id: Uuid },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;

    let pool = db::init_pool(&cfg.database_url()).await?;
    db::run_migrations(&pool).await?;

    let store = Arc::new(SqliteStore::new(pool));
    let storage = cfg.object_storage()?;
    let pipeline = SubmissionPipeline::new(store.clone(), storage);
    let session = cfg.session();

    match args.command {
        Command::Create { draft } => create(&cfg, &pipeline, &session, draft).await,
        Command::Edit { post_id, draft } => {
            let owner = require_user(&session)?;
            edit(store.as_ref(), post_id, owner, draft).await
        }
        Command::Show { post_id } => show(store.as_ref(), post_id).await,
        Command::List {
            post_type,
            location,
            search,
            min_price,
            max_price,
            gender,
            mine,
            json,
        } => {
            if mine {
                let owner = require_user(&session)?;
                return list_mine(&store, owner, json).await;
            }
            let filter = PostFilter {
                post_type,
                location,
                search,
                price_min: min_price,
                price_max: max_price,
                gender_preference: gender,
            };
            let posts = db::list_posts(store.pool(), &filter).await?;
            print_posts(&posts, json)
        }
        Command::DeleteImage { image_id } => {
            let owner = require_user(&session)?;
            pipeline.delete_image(image_id, owner).await?;
            println!("Imagem removida");
            Ok(())
        }
        Command::DeletePost { post_id } => {
            let owner = require_user(&session)?;
            pipeline.delete_post(post_id, owner).await?;
            println!("Post removido");
            Ok(())
        }
    }
}

fn require_user(session: &dyn SessionProvider) -> Result<Uuid> {
    session
        .current_user()
        .context("no session.user_id configured")
}

fn print_errors(errors: &ValidationErrors) {
    for (field, message) in errors.iter() {
        eprintln!("  {}: {}", field, message);
    }
}

async fn create(
    cfg: &Config,
    pipeline: &SubmissionPipeline,
    session: &dyn SessionProvider,
    path: PathBuf,
) -> Result<()> {
    let input = DraftInput::load(&path)?;
    let images = input.read_images().await?;
    let requested = images.len();

    let mut wizard = Wizard::new(cfg.app.max_images);
    input.apply_to_wizard(&mut wizard);
    let accepted = wizard.add_images(images);
    if accepted < requested {
        warn!(accepted, requested, max = cfg.app.max_images, "some images were not accepted");
    }

    while wizard.current_step() != Step::Review {
        let step = wizard.current_step();
        if !wizard.next() {
            eprintln!("Etapa {} ({}) incompleta:", step.index(), step.title());
            print_errors(wizard.errors());
            bail!("draft {} is incomplete", path.display());
        }
    }

    match wizard.submit(pipeline, session).await {
        Outcome::Success { post_id } => {
            info!(%post_id, "post created");
            println!("Post criado: {}", post_id);
            Ok(())
        }
        Outcome::PartialSuccess { post_id, warning } => {
            println!("Post criado: {}", post_id);
            println!("Aviso: {}", warning);
            Ok(())
        }
        Outcome::Failure(FailureReason::Validation(errors)) => {
            print_errors(&errors);
            bail!("draft {} is invalid", path.display())
        }
        Outcome::Failure(reason) => Err(reason.into()),
    }
}

async fn edit(store: &dyn PostStore, post_id: Uuid, owner: Uuid, path: PathBuf) -> Result<()> {
    let input = DraftInput::load(&path)?;
    if !input.images.is_empty() {
        warn!("images are ignored when editing");
    }
    let mut form = EditForm::load(store, post_id, owner).await?;
    input.apply_to_form(&mut form);
    match form.save(store).await {
        Ok(post) => {
            println!("Post atualizado: {}", post.id);
            Ok(())
        }
        Err(err) => {
            print_errors(form.errors());
            Err(err.into())
        }
    }
}

async fn show(store: &dyn PostStore, post_id: Uuid) -> Result<()> {
    let Some(post) = store.get_post(post_id).await? else {
        bail!("Post não encontrado");
    };
    let images = store.list_images(post.id).await?;
    let f = &post.fields;

    println!("{} [{}]", f.title, f.post_type.label());
    if !post.is_active(Utc::now()) {
        println!("Este post expirou");
    }
    println!("Valor: {}", format::format_price(f.price));
    println!("Local: {}", f.location);
    if let Some(date) = f.available_date {
        println!("Disponível: {}", format::format_date(date));
    }
    if let Some(g) = f.gender_preference {
        println!("Preferência: {}", g.label());
    }
    println!("Publicado: {}", format::format_date(post.created_at.date_naive()));
    println!();
    println!("{}", f.description);
    if let Some(extra) = &f.extra_info {
        println!();
        println!("{}", extra);
    }

    println!();
    if !format::has_contact_info(f) {
        println!("Sem contato informado");
    }
    if let Some(phone) = &f.contact_whatsapp {
        println!("WhatsApp: {} ({})", format::format_phone(phone), format::whatsapp_link(phone));
    }
    if let Some(email) = &f.contact_email {
        println!("Email: {} ({})", email, format::email_link(email));
    }
    if let Some(tg) = &f.contact_telegram {
        println!("Telegram: {} ({})", tg, format::telegram_link(tg));
    }

    for image in images {
        println!("Imagem {} [{}]: {}", image.display_order + 1, image.id, image.image_url);
    }
    Ok(())
}

async fn list_mine(store: &SqliteStore, owner: Uuid, json: bool) -> Result<()> {
    let posts = db::list_posts_by_owner(store.pool(), owner).await?;
    let stats = db::owner_stats(store.pool(), owner).await?;
    if json {
        let out = serde_json::json!({ "stats": stats, "posts": posts });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }
    println!(
        "{} posts ({} ativos, {} expirados)",
        stats.total, stats.active, stats.expired
    );
    print_posts(&posts, false)
}

fn print_posts(posts: &[PersistedPost], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(posts)?);
        return Ok(());
    }
    if posts.is_empty() {
        println!("Nenhum post encontrado");
    }
    let now = Utc::now();
    for post in posts {
        let f = &post.fields;
        println!(
            "{}  {:<14} {:<12} {}{}",
            post.id,
            f.post_type.label(),
            format::format_price(f.price),
            format::truncate_text(&f.title, 40),
            if post.is_active(now) { "" } else { " (expirado)" }
        );
        println!("    {}", format::truncate_text(&f.location, 60));
    }
    Ok(())
}
