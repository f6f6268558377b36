mod read;
mod types;
mod write;

pub(crate) use types::PostRow;

/// Columns selected for every post projection, aliased to the `p` table.
pub(crate) const POST_COLUMNS: &str = "p.id, p.slug, p.title, p.content, p.summary, p.status, \
     p.published_at, p.read_time_minutes, p.created_at, p.updated_at";
