use super::model::OwnerStats;
use crate::model::{
    GenderPreference, NewPostImage, PersistedPost, PostFields, PostFilter, PostImage, PostType,
};
use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use tracing::instrument;
use uuid::Uuid;

pub type Pool = SqlitePool;

const POST_COLUMNS: &str = "id, user_id, post_type, title, description, location, price, \
     available_date, contact_whatsapp, contact_email, contact_telegram, gender_preference, \
     extra_info, created_at, updated_at, expires_at";

const IMAGE_COLUMNS: &str = "id, post_id, image_url, display_order, created_at";

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    let pool = SqlitePool::connect(&normalized).await?;
    // Enable WAL and stricter durability.
    sqlx::query("PRAGMA journal_mode=WAL;")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous=FULL;")
        .execute(&pool)
        .await?;
    Ok(pool)
}

/// Expand a leading `~/` in file-backed SQLite URLs and create the parent
/// directory. In-memory and non-sqlite URLs pass through untouched.
fn prepare_sqlite_url(url: &str) -> String {
    let Some(rest) = url.strip_prefix("sqlite:") else {
        return url.to_string();
    };
    if rest.starts_with(":memory") {
        return url.to_string();
    }

    let path_with_query = rest.strip_prefix("//").unwrap_or(rest);
    let (path_part, query_part) = match path_with_query.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path_with_query, None),
    };
    if path_part.is_empty() {
        return url.to_string();
    }

    let expanded_path = match (path_part.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(rest), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), rest),
        _ => path_part.to_string(),
    };

    if let Some(parent) = std::path::Path::new(&expanded_path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    let mut rebuilt = format!("sqlite://{}", expanded_path);
    if let Some(q) = query_part {
        rebuilt.push('?');
        rebuilt.push_str(q);
    }
    rebuilt
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

fn parse_uuid(row: &SqliteRow, column: &str) -> Result<Uuid> {
    let raw: String = row.try_get(column)?;
    Uuid::parse_str(&raw).with_context(|| format!("column {} holds invalid uuid {}", column, raw))
}

fn post_from_row(row: &SqliteRow) -> Result<PersistedPost> {
    let post_type: String = row.try_get("post_type")?;
    let post_type = PostType::parse(&post_type)
        .ok_or_else(|| anyhow!("unknown post_type {}", post_type))?;
    let gender_preference = match row.try_get::<Option<String>, _>("gender_preference")? {
        Some(raw) => Some(
            GenderPreference::parse(&raw)
                .ok_or_else(|| anyhow!("unknown gender_preference {}", raw))?,
        ),
        None => None,
    };

    Ok(PersistedPost {
        id: parse_uuid(row, "id")?,
        owner_id: parse_uuid(row, "user_id")?,
        fields: PostFields {
            post_type,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            location: row.try_get("location")?,
            price: row.try_get("price")?,
            available_date: row.try_get("available_date")?,
            contact_whatsapp: row.try_get("contact_whatsapp")?,
            contact_email: row.try_get("contact_email")?,
            contact_telegram: row.try_get("contact_telegram")?,
            gender_preference,
            extra_info: row.try_get("extra_info")?,
        },
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        expires_at: row.try_get("expires_at")?,
    })
}

fn image_from_row(row: &SqliteRow) -> Result<PostImage> {
    Ok(PostImage {
        id: parse_uuid(row, "id")?,
        post_id: parse_uuid(row, "post_id")?,
        image_url: row.try_get("image_url")?,
        display_order: row.try_get("display_order")?,
        created_at: row.try_get("created_at")?,
    })
}

#[instrument(skip_all)]
pub async fn insert_post(pool: &Pool, owner_id: Uuid, fields: &PostFields) -> Result<PersistedPost> {
    let id = Uuid::new_v4();
    let row = sqlx::query(&format!(
        "INSERT INTO posts (id, user_id, post_type, title, description, location, price, \
         available_date, contact_whatsapp, contact_email, contact_telegram, gender_preference, \
         extra_info) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING {}",
        POST_COLUMNS
    ))
    .bind(id.to_string())
    .bind(owner_id.to_string())
    .bind(fields.post_type.as_str())
    .bind(&fields.title)
    .bind(&fields.description)
    .bind(&fields.location)
    .bind(fields.price)
    .bind(fields.available_date)
    .bind(fields.contact_whatsapp.as_deref())
    .bind(fields.contact_email.as_deref())
    .bind(fields.contact_telegram.as_deref())
    .bind(fields.gender_preference.map(|g| g.as_str()))
    .bind(fields.extra_info.as_deref())
    .fetch_one(pool)
    .await?;
    post_from_row(&row)
}

#[instrument(skip_all)]
pub async fn fetch_post(pool: &Pool, id: Uuid) -> Result<Option<PersistedPost>> {
    let row = sqlx::query(&format!("SELECT {} FROM posts WHERE id = ?", POST_COLUMNS))
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(post_from_row).transpose()
}

#[instrument(skip_all)]
pub async fn fetch_post_for_owner(
    pool: &Pool,
    id: Uuid,
    owner_id: Uuid,
) -> Result<Option<PersistedPost>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM posts WHERE id = ? AND user_id = ?",
        POST_COLUMNS
    ))
    .bind(id.to_string())
    .bind(owner_id.to_string())
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(post_from_row).transpose()
}

/// Overwrite the editable fields of an owned post and stamp `updated_at`.
/// Returns `None` when no post with that id belongs to `owner_id`.
#[instrument(skip_all)]
pub async fn update_post(
    pool: &Pool,
    id: Uuid,
    owner_id: Uuid,
    fields: &PostFields,
) -> Result<Option<PersistedPost>> {
    let row = sqlx::query(&format!(
        "UPDATE posts SET post_type = ?, title = ?, description = ?, location = ?, price = ?, \
         available_date = ?, contact_whatsapp = ?, contact_email = ?, contact_telegram = ?, \
         gender_preference = ?, extra_info = ?, updated_at = ? \
         WHERE id = ? AND user_id = ? RETURNING {}",
        POST_COLUMNS
    ))
    .bind(fields.post_type.as_str())
    .bind(&fields.title)
    .bind(&fields.description)
    .bind(&fields.location)
    .bind(fields.price)
    .bind(fields.available_date)
    .bind(fields.contact_whatsapp.as_deref())
    .bind(fields.contact_email.as_deref())
    .bind(fields.contact_telegram.as_deref())
    .bind(fields.gender_preference.map(|g| g.as_str()))
    .bind(fields.extra_info.as_deref())
    .bind(Utc::now())
    .bind(id.to_string())
    .bind(owner_id.to_string())
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(post_from_row).transpose()
}

#[instrument(skip_all)]
pub async fn delete_post(pool: &Pool, id: Uuid) -> Result<bool> {
    let res = sqlx::query("DELETE FROM posts WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;
    Ok(res.rows_affected() > 0)
}

/// Active posts matching `filter`, newest first.
#[instrument(skip_all)]
pub async fn list_posts(pool: &Pool, filter: &PostFilter) -> Result<Vec<PersistedPost>> {
    let mut qb: QueryBuilder<'_, Sqlite> = QueryBuilder::new(format!(
        "SELECT {} FROM posts WHERE datetime(expires_at) > CURRENT_TIMESTAMP",
        POST_COLUMNS
    ));

    if let Some(post_type) = filter.post_type {
        qb.push(" AND post_type = ").push_bind(post_type.as_str());
    }
    if let Some(location) = non_blank(filter.location.as_deref()) {
        // LIKE is case-insensitive for ASCII in SQLite.
        qb.push(" AND location LIKE ")
            .push_bind(contains_pattern(location))
            .push(LIKE_ESCAPE);
    }
    if let Some(search) = non_blank(filter.search.as_deref()) {
        let pattern = contains_pattern(search);
        qb.push(" AND (title LIKE ")
            .push_bind(pattern.clone())
            .push(LIKE_ESCAPE)
            .push(" OR description LIKE ")
            .push_bind(pattern)
            .push(LIKE_ESCAPE)
            .push(")");
    }
    if let Some(min) = filter.price_min {
        qb.push(" AND price >= ").push_bind(min);
    }
    if let Some(max) = filter.price_max {
        qb.push(" AND price <= ").push_bind(max);
    }
    if let Some(gender) = filter.gender_preference {
        qb.push(" AND gender_preference = ").push_bind(gender.as_str());
    }
    qb.push(" ORDER BY datetime(created_at) DESC, rowid DESC");

    let rows = qb.build().fetch_all(pool).await?;
    rows.iter().map(post_from_row).collect()
}

#[instrument(skip_all)]
pub async fn list_posts_by_owner(pool: &Pool, owner_id: Uuid) -> Result<Vec<PersistedPost>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM posts WHERE user_id = ? ORDER BY datetime(created_at) DESC, rowid DESC",
        POST_COLUMNS
    ))
    .bind(owner_id.to_string())
    .fetch_all(pool)
    .await?;
    rows.iter().map(post_from_row).collect()
}

#[instrument(skip_all)]
pub async fn owner_stats(pool: &Pool, owner_id: Uuid) -> Result<OwnerStats> {
    let row = sqlx::query(
        "SELECT COUNT(*) AS total, \
                COALESCE(SUM(CASE WHEN datetime(expires_at) > CURRENT_TIMESTAMP THEN 1 ELSE 0 END), 0) AS active \
         FROM posts WHERE user_id = ?",
    )
    .bind(owner_id.to_string())
    .fetch_one(pool)
    .await?;
    let total: i64 = row.try_get("total")?;
    let active: i64 = row.try_get("active")?;
    Ok(OwnerStats {
        total,
        active,
        expired: total - active,
    })
}

#[instrument(skip_all)]
pub async fn insert_image(pool: &Pool, image: &NewPostImage) -> Result<PostImage> {
    let row = sqlx::query(&format!(
        "INSERT INTO post_images (id, post_id, image_url, display_order) VALUES (?, ?, ?, ?) RETURNING {}",
        IMAGE_COLUMNS
    ))
    .bind(Uuid::new_v4().to_string())
    .bind(image.post_id.to_string())
    .bind(&image.image_url)
    .bind(image.display_order)
    .fetch_one(pool)
    .await?;
    image_from_row(&row)
}

#[instrument(skip_all)]
pub async fn fetch_image(pool: &Pool, id: Uuid) -> Result<Option<PostImage>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM post_images WHERE id = ?",
        IMAGE_COLUMNS
    ))
    .bind(id.to_string())
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(image_from_row).transpose()
}

#[instrument(skip_all)]
pub async fn list_images(pool: &Pool, post_id: Uuid) -> Result<Vec<PostImage>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM post_images WHERE post_id = ? ORDER BY display_order ASC",
        IMAGE_COLUMNS
    ))
    .bind(post_id.to_string())
    .fetch_all(pool)
    .await?;
    rows.iter().map(image_from_row).collect()
}

#[instrument(skip_all)]
pub async fn delete_image(pool: &Pool, id: Uuid) -> Result<bool> {
    let res = sqlx::query("DELETE FROM post_images WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;
    Ok(res.rows_affected() > 0)
}

const LIKE_ESCAPE: &str = " ESCAPE '\\'";

/// `%needle%` with the needle's own `%`, `_` and `\` matched literally.
fn contains_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for ch in needle.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}
