//! Role/phase/project/user profile management and query-vector
//! composition (§4.6). Mirrors `profiles.py`.

use sqlx::SqlitePool;

use crate::config::QueryWeights;
use crate::embedding::{compute_embedding, normalize};
use crate::error::{ProfileError, Result};
use crate::model::{Phase, Project, Role, User};
use crate::store::profile_store;

fn normalized_vector(text: &str) -> Vec<f64> {
    normalize(&compute_embedding(text))
}

pub async fn create_role(
    pool: &SqlitePool,
    role_id: &str,
    name: &str,
    description: &str,
    now: f64,
) -> Result<Vec<f64>> {
    let vector = normalized_vector(description);
    profile_store::upsert_role(pool, role_id, name, description, &vector, now).await?;
    Ok(vector)
}

pub async fn create_phase(
    pool: &SqlitePool,
    phase_key: &str,
    description: &str,
    now: f64,
) -> Result<Vec<f64>> {
    let vector = normalized_vector(description);
    profile_store::upsert_phase(pool, phase_key, description, &vector, now).await?;
    Ok(vector)
}

/// Create a project. `channels`, if given, seeds the `project_channels`
/// association table directly — the same table `POST /projects/{p}/channels`
/// appends to, so retrieval sees one source of truth for project membership.
pub async fn create_project(
    pool: &SqlitePool,
    project_id: &str,
    name: &str,
    current_phase: &str,
    channels: Option<&[String]>,
    now: f64,
) -> Result<()> {
    if profile_store::fetch_phase(pool, current_phase).await?.is_none() {
        return Err(ProfileError::UnknownPhase(current_phase.to_string()).into());
    }
    profile_store::upsert_project(pool, project_id, name, current_phase, now).await?;
    for channel_id in channels.unwrap_or_default() {
        profile_store::add_project_channel(pool, project_id, channel_id).await?;
    }
    Ok(())
}

pub async fn update_project_phase(
    pool: &SqlitePool,
    project_id: &str,
    phase_key: &str,
    now: f64,
) -> Result<()> {
    if profile_store::fetch_phase(pool, phase_key).await?.is_none() {
        return Err(ProfileError::UnknownPhase(phase_key.to_string()).into());
    }
    profile_store::update_project_phase(pool, project_id, phase_key, now).await
}

/// Create a user. If `role_id` is given, the user's vector is initialized
/// to that role's vector outright (§3: reset on role assignment).
pub async fn create_user(
    pool: &SqlitePool,
    user_id: &str,
    name: &str,
    role_id: Option<&str>,
    now: f64,
) -> Result<(Option<Vec<f64>>, Option<String>)> {
    let role_vector = match role_id {
        Some(rid) => {
            let role = profile_store::fetch_role(pool, rid)
                .await?
                .ok_or_else(|| ProfileError::UnknownRole(rid.to_string()))?;
            Some(role.role_vector)
        }
        None => None,
    };
    profile_store::upsert_user(pool, user_id, name, None, role_id, role_vector.as_deref(), now).await?;
    Ok((role_vector, role_id.map(|s| s.to_string())))
}

/// Reassign a user's role, resetting their vector to the new role's
/// vector (discarding feedback-learned drift, per §3).
pub async fn update_user_role(
    pool: &SqlitePool,
    user_id: &str,
    role_id: &str,
    now: f64,
) -> Result<Vec<f64>> {
    let role = profile_store::fetch_role(pool, role_id)
        .await?
        .ok_or_else(|| ProfileError::UnknownRole(role_id.to_string()))?;
    profile_store::update_user_role(pool, user_id, role_id, &role.role_vector, now).await?;
    Ok(role.role_vector)
}

pub async fn add_user_to_project(pool: &SqlitePool, user_id: &str, project_id: &str) -> Result<()> {
    profile_store::fetch_user(pool, user_id)
        .await?
        .ok_or_else(|| ProfileError::UnknownUser(user_id.to_string()))?;
    profile_store::fetch_project(pool, project_id)
        .await?
        .ok_or_else(|| ProfileError::UnknownProject(project_id.to_string()))?;
    profile_store::add_user_project(pool, user_id, project_id).await
}

pub struct UserProfile {
    pub user_id: String,
    pub role_id: Option<String>,
    pub user_vector_dim: usize,
    pub projects: Vec<String>,
}

pub async fn get_user_profile(pool: &SqlitePool, user_id: &str) -> Result<UserProfile> {
    let user = profile_store::fetch_user(pool, user_id)
        .await?
        .ok_or_else(|| ProfileError::UnknownUser(user_id.to_string()))?;
    let projects = profile_store::fetch_user_projects(pool, user_id).await?;
    Ok(UserProfile {
        user_id: user.user_id,
        role_id: user.role_id,
        user_vector_dim: user.user_vector.map(|v| v.len()).unwrap_or(0),
        projects: projects.into_iter().map(|p| p.project_id).collect(),
    })
}

pub struct ProjectProfile {
    pub project_id: String,
    pub current_phase: String,
    pub phase_vector: Vec<f64>,
}

pub async fn get_project_profile(pool: &SqlitePool, project_id: &str) -> Result<ProjectProfile> {
    let project = profile_store::fetch_project(pool, project_id)
        .await?
        .ok_or_else(|| ProfileError::UnknownProject(project_id.to_string()))?;
    let phase_vector = if project.current_phase.is_empty() {
        Vec::new()
    } else {
        profile_store::fetch_phase(pool, &project.current_phase)
            .await?
            .map(|p| p.phase_vector)
            .unwrap_or_default()
    };
    Ok(ProjectProfile {
        project_id: project.project_id,
        current_phase: project.current_phase,
        phase_vector,
    })
}

/// Indices of the five largest-magnitude components of `vector`, for the
/// query-vector diagnostic view.
fn top_indices(vector: &[f64], top_k: usize) -> Vec<usize> {
    let mut indexed: Vec<(usize, f64)> = vector.iter().copied().enumerate().collect();
    indexed.sort_by(|a, b| b.1.abs().partial_cmp(&a.1.abs()).unwrap());
    indexed.into_iter().take(top_k).map(|(i, _)| i).collect()
}

#[derive(Debug, Clone, Copy)]
pub struct ResolvedWeights {
    pub role: f64,
    pub user: f64,
    pub phase: f64,
}

pub struct QueryVectorResult {
    pub q_vector: Vec<f64>,
    pub weights: ResolvedWeights,
    pub component_norms: ResolvedWeights,
    pub component_top_indices: (Vec<usize>, Vec<usize>, Vec<usize>),
}

/// Combine role/user/phase vectors into a single query vector (§4.6). When
/// `phase_vec` is `None`, the role/user weights renormalize to sum to 1.0
/// (not `w_role + w_user`) — see DESIGN.md's "query-vector weight
/// renormalization" entry for why this matches the reference exactly.
pub fn weighted_query_vector(
    role_vec: &[f64],
    user_vec: Option<&[f64]>,
    phase_vec: Option<&[f64]>,
    weights: QueryWeights,
) -> QueryVectorResult {
    let effective_user = user_vec.unwrap_or(role_vec);
    let (w_role, w_user, w_phase) = if phase_vec.is_none() {
        let total = weights.role + weights.user;
        (weights.role / total, weights.user / total, 0.0)
    } else {
        (weights.role, weights.user, weights.phase)
    };

    let contrib_role: Vec<f64> = role_vec.iter().map(|v| w_role * v).collect();
    let contrib_user: Vec<f64> = effective_user.iter().map(|v| w_user * v).collect();
    let contrib_phase: Vec<f64> = match phase_vec {
        Some(pv) => pv.iter().map(|v| w_phase * v).collect(),
        None => vec![0.0; role_vec.len()],
    };

    let combined: Vec<f64> = (0..role_vec.len())
        .map(|i| contrib_role[i] + contrib_user[i] + contrib_phase[i])
        .collect();
    let q_vector = normalize(&combined);

    let norm = |v: &[f64]| v.iter().map(|x| x * x).sum::<f64>().sqrt();

    QueryVectorResult {
        q_vector,
        weights: ResolvedWeights {
            role: w_role,
            user: w_user,
            phase: w_phase,
        },
        component_norms: ResolvedWeights {
            role: norm(&contrib_role),
            user: norm(&contrib_user),
            phase: norm(&contrib_phase),
        },
        component_top_indices: (
            top_indices(&contrib_role, 5),
            top_indices(&contrib_user, 5),
            top_indices(&contrib_phase, 5),
        ),
    }
}

pub struct UserQueryContext {
    pub role_id: String,
    pub phase_key: Option<String>,
    pub result: QueryVectorResult,
}

/// Look up a user's and project's current state and compose their query
/// vector. Mirrors `profiles.py::get_query_vector`.
pub async fn get_query_vector(
    pool: &SqlitePool,
    user_id: &str,
    project_id: &str,
    weights: QueryWeights,
) -> Result<UserQueryContext> {
    let user = profile_store::fetch_user(pool, user_id)
        .await?
        .ok_or_else(|| ProfileError::UnknownUser(user_id.to_string()))?;
    let project = profile_store::fetch_project(pool, project_id)
        .await?
        .ok_or_else(|| ProfileError::UnknownProject(project_id.to_string()))?;
    let role_id = user
        .role_id
        .clone()
        .ok_or_else(|| ProfileError::UnknownRole(String::new()))?;
    let role: Role = profile_store::fetch_role(pool, &role_id)
        .await?
        .ok_or_else(|| ProfileError::UnknownRole(role_id.clone()))?;

    let phase_key = if project.current_phase.is_empty() {
        None
    } else {
        Some(project.current_phase.clone())
    };
    let phase: Option<Phase> = match &phase_key {
        Some(key) => profile_store::fetch_phase(pool, key).await?,
        None => None,
    };

    let result = weighted_query_vector(
        &role.role_vector,
        user.user_vector.as_deref(),
        phase.as_ref().map(|p| p.phase_vector.as_slice()),
        weights,
    );

    Ok(UserQueryContext {
        role_id,
        phase_key,
        result,
    })
}

/// Fetch a `(User, Project)` pair or the corresponding `ProfileError`,
/// shared by handlers that need both before proceeding.
pub async fn require_user_and_project(
    pool: &SqlitePool,
    user_id: &str,
    project_id: &str,
) -> Result<(User, Project)> {
    let user = profile_store::fetch_user(pool, user_id)
        .await?
        .ok_or_else(|| ProfileError::UnknownUser(user_id.to_string()))?;
    let project = profile_store::fetch_project(pool, project_id)
        .await?
        .ok_or_else(|| ProfileError::UnknownProject(project_id.to_string()))?;
    Ok((user, project))
}

/// A project with no mapped channels grants nobody access, and a user
/// whose channels aren't a superset of the project's is denied. Mirrors
/// `routes_profiles.py`'s `/digest` guard.
pub async fn check_channel_access(pool: &SqlitePool, user_id: &str, project_id: &str) -> Result<()> {
    let project_channels = profile_store::fetch_project_channels(pool, project_id).await?;
    if project_channels.is_empty() {
        return Err(ProfileError::AccessDenied.into());
    }
    let user_channels = profile_store::fetch_user_channels(pool, user_id).await?;
    let user_set: std::collections::HashSet<&str> = user_channels.iter().map(String::as_str).collect();
    if !project_channels.iter().all(|c| user_set.contains(c.as_str())) {
        return Err(ProfileError::AccessDenied.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weighted_query_vector_renormalizes_without_phase() {
        let role = vec![1.0, 0.0];
        let result = weighted_query_vector(
            &role,
            None,
            None,
            QueryWeights {
                role: 0.45,
                user: 0.35,
                phase: 0.20,
            },
        );
        assert!((result.weights.role - 0.45 / 0.8).abs() < 1e-9);
        assert!((result.weights.user - 0.35 / 0.8).abs() < 1e-9);
        assert_eq!(result.weights.phase, 0.0);
    }

    #[test]
    fn weighted_query_vector_is_unit_norm() {
        let role = vec![1.0, 0.0, 0.0];
        let user = vec![0.0, 1.0, 0.0];
        let phase = vec![0.0, 0.0, 1.0];
        let result = weighted_query_vector(
            &role,
            Some(&user),
            Some(&phase),
            QueryWeights {
                role: 0.45,
                user: 0.35,
                phase: 0.20,
            },
        );
        let norm: f64 = result.q_vector.iter().map(|v| v * v).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-9);
    }
}
