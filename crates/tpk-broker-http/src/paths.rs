//! Management API endpoint construction.
//!
//! Every vhost, name and properties key is pushed as a single path segment,
//! so `/` (the default vhost) and `%` are percent-encoded (`%2F`, `%25`).

use reqwest::Url;
use tpk_schemas::{DestinationType, Entity, EntityKind};

pub fn collection(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::User => "users",
        EntityKind::Policy => "policies",
        EntityKind::Queue => "queues",
        EntityKind::Exchange => "exchanges",
        EntityKind::Binding => "bindings",
    }
}

fn destination_segment(t: DestinationType) -> &'static str {
    match t {
        DestinationType::Queue => "q",
        DestinationType::Exchange => "e",
    }
}

/// Segments (below `/api`) of the create request for `entity`.
pub fn create_segments(entity: &Entity) -> Vec<&str> {
    match entity {
        Entity::User(u) => vec![collection(EntityKind::User), u.name.as_str()],
        Entity::Policy(p) => vec![
            collection(EntityKind::Policy),
            p.vhost.as_str(),
            p.name.as_str(),
        ],
        Entity::Queue(q) => vec![
            collection(EntityKind::Queue),
            q.vhost.as_str(),
            q.name.as_str(),
        ],
        Entity::Exchange(e) => vec![
            collection(EntityKind::Exchange),
            e.vhost.as_str(),
            e.name.as_str(),
        ],
        Entity::Binding(b) => vec![
            collection(EntityKind::Binding),
            b.vhost.as_str(),
            "e",
            b.source.as_str(),
            destination_segment(b.destination_type),
            b.destination.as_str(),
        ],
    }
}

/// Segments (below `/api`) of the delete request for `entity`. Bindings are
/// addressed by their properties key.
pub fn delete_segments(entity: &Entity) -> Vec<&str> {
    let mut segments = create_segments(entity);
    if let Entity::Binding(b) = entity {
        segments.push(b.properties_key.as_str());
    }
    segments
}

/// `base` + `/api` + `segments`, each segment percent-encoded.
/// `None` when `base` cannot carry a path.
pub fn endpoint<S: AsRef<str>>(base: &Url, segments: &[S]) -> Option<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .ok()?
        .pop_if_empty()
        .push("api")
        .extend(segments);
    Some(url)
}
