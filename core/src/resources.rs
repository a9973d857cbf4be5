//! Query and mutation catalogue, one module per backend resource.
//!
//! Every function here returns a descriptor; nothing is sent until a
//! [`Session`](crate::session::Session) runs it. Cache keys always come
//! from [`crate::keys`], so a query and the mutations that touch it share
//! a single definition.

use crate::descriptor::{MutationDescriptor, QueryDescriptor};
use crate::error::ApiError;
use crate::http::HttpMethod;
use crate::keys;
use crate::services::Service;

pub mod posts {
    use super::*;

    pub fn list() -> Result<QueryDescriptor, ApiError> {
        QueryDescriptor::new(Service::Posts, keys::posts::all(), "")
    }

    pub fn get(id: u64) -> Result<QueryDescriptor, ApiError> {
        QueryDescriptor::new(Service::Posts, keys::posts::detail(id), format!("/{id}"))
    }

    pub fn create() -> Result<MutationDescriptor, ApiError> {
        MutationDescriptor::new(
            Service::Posts,
            HttpMethod::Post,
            "",
            vec![keys::posts::all()],
            "Post created successfully!",
            "Failed to create post",
        )
    }

    /// Invalidating the list key also covers the detail key of `id`.
    pub fn update(id: u64) -> Result<MutationDescriptor, ApiError> {
        MutationDescriptor::new(
            Service::Posts,
            HttpMethod::Put,
            format!("/{id}"),
            vec![keys::posts::all()],
            "Post updated successfully!",
            "Failed to update post",
        )
    }

    pub fn delete(id: u64) -> Result<MutationDescriptor, ApiError> {
        MutationDescriptor::new(
            Service::Posts,
            HttpMethod::Delete,
            format!("/{id}"),
            vec![keys::posts::all()],
            "Post deleted successfully!",
            "Failed to delete post",
        )
    }
}

pub mod comments {
    use super::*;

    pub fn list() -> Result<QueryDescriptor, ApiError> {
        QueryDescriptor::new(Service::Comments, keys::comments::all(), "")
    }

    pub fn by_post(post_id: u64) -> Result<QueryDescriptor, ApiError> {
        QueryDescriptor::new(
            Service::Comments,
            keys::comments::by_post(post_id),
            format!("?postId={post_id}"),
        )
    }

    // Comment mutations invalidate the whole `comments` prefix: the full
    // list and every per-post list go stale together.

    pub fn create() -> Result<MutationDescriptor, ApiError> {
        MutationDescriptor::new(
            Service::Comments,
            HttpMethod::Post,
            "",
            vec![keys::comments::all()],
            "Comment created successfully!",
            "Failed to create comment",
        )
    }

    pub fn update(id: u64) -> Result<MutationDescriptor, ApiError> {
        MutationDescriptor::new(
            Service::Comments,
            HttpMethod::Put,
            format!("/{id}"),
            vec![keys::comments::all()],
            "Comment updated successfully!",
            "Failed to update comment",
        )
    }

    pub fn delete(id: u64) -> Result<MutationDescriptor, ApiError> {
        MutationDescriptor::new(
            Service::Comments,
            HttpMethod::Delete,
            format!("/{id}"),
            vec![keys::comments::all()],
            "Comment deleted successfully!",
            "Failed to delete comment",
        )
    }
}

/// Users, served under the `users` service.
pub mod profiles {
    use super::*;

    pub fn list() -> Result<QueryDescriptor, ApiError> {
        QueryDescriptor::new(Service::Users, keys::profiles::all(), "")
    }

    pub fn get(id: u64) -> Result<QueryDescriptor, ApiError> {
        QueryDescriptor::new(Service::Users, keys::profiles::detail(id), format!("/{id}"))
    }

    pub fn posts(user_id: u64) -> Result<QueryDescriptor, ApiError> {
        QueryDescriptor::new(
            Service::Users,
            keys::posts::by_user(user_id),
            format!("/{user_id}/posts"),
        )
    }

    pub fn albums(user_id: u64) -> Result<QueryDescriptor, ApiError> {
        QueryDescriptor::new(
            Service::Users,
            keys::profiles::albums(user_id),
            format!("/{user_id}/albums"),
        )
    }

    pub fn todos(user_id: u64) -> Result<QueryDescriptor, ApiError> {
        QueryDescriptor::new(
            Service::Users,
            keys::profiles::todos(user_id),
            format!("/{user_id}/todos"),
        )
    }

    pub fn update(id: u64) -> Result<MutationDescriptor, ApiError> {
        MutationDescriptor::new(
            Service::Users,
            HttpMethod::Put,
            format!("/{id}"),
            vec![keys::profiles::all()],
            "Profile updated successfully!",
            "Failed to update profile",
        )
    }
}

pub mod albums {
    use super::*;

    pub fn photos(album_id: u64) -> Result<QueryDescriptor, ApiError> {
        QueryDescriptor::new(
            Service::Albums,
            keys::albums::photos(album_id),
            format!("/{album_id}/photos"),
        )
    }
}

pub mod photos {
    use super::*;

    pub fn list() -> Result<QueryDescriptor, ApiError> {
        QueryDescriptor::new(Service::Photos, keys::photos::all(), "")
    }

    pub fn get(id: u64) -> Result<QueryDescriptor, ApiError> {
        QueryDescriptor::new(Service::Photos, keys::photos::detail(id), format!("/{id}"))
    }
}

/// Todo mutations take the owning user so the profile's todo tab goes
/// stale along with the global list.
pub mod todos {
    use super::*;

    pub fn list() -> Result<QueryDescriptor, ApiError> {
        QueryDescriptor::new(Service::Todos, keys::todos::all(), "")
    }

    pub fn get(id: u64) -> Result<QueryDescriptor, ApiError> {
        QueryDescriptor::new(Service::Todos, keys::todos::detail(id), format!("/{id}"))
    }

    pub fn create(user_id: u64) -> Result<MutationDescriptor, ApiError> {
        write(user_id, HttpMethod::Post, String::new(), "created", "create")
    }

    pub fn update(user_id: u64, id: u64) -> Result<MutationDescriptor, ApiError> {
        write(user_id, HttpMethod::Put, format!("/{id}"), "updated", "update")
    }

    pub fn delete(user_id: u64, id: u64) -> Result<MutationDescriptor, ApiError> {
        write(user_id, HttpMethod::Delete, format!("/{id}"), "deleted", "delete")
    }

    fn write(
        user_id: u64,
        method: HttpMethod,
        path: String,
        done: &str,
        verb: &str,
    ) -> Result<MutationDescriptor, ApiError> {
        MutationDescriptor::new(
            Service::Todos,
            method,
            path,
            vec![keys::todos::all(), keys::profiles::todos(user_id)],
            format!("Todo {done} successfully!"),
            format!("Failed to {verb} todo"),
        )
    }
}
