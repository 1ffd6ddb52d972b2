pub mod attendance;
pub mod dashboard;
pub mod history;
pub mod standard;
pub mod student;
pub mod teacher;

#[cfg(test)]
pub(crate) mod test_support {
    use crate::auth::auth::AuthUser;
    use crate::auth::jwt::generate_access_token;
    use crate::config::Config;
    use crate::model::role::Role;
    use crate::services::ledger::tests::seed_user;
    use sqlx::SqlitePool;

    pub(crate) async fn teacher_in(pool: &SqlitePool) -> AuthUser {
        AuthUser {
            user_id: seed_user(pool, "teacher").await,
            username: "teacher".to_string(),
            role: Role::Teacher,
        }
    }

    pub(crate) async fn admin_in(pool: &SqlitePool) -> AuthUser {
        let user_id = seed_user(pool, "principal").await;
        sqlx::query("UPDATE users SET role_id = ? WHERE id = ?")
            .bind(Role::Admin.id())
            .bind(user_id)
            .execute(pool)
            .await
            .unwrap();
        AuthUser {
            user_id,
            username: "principal".to_string(),
            role: Role::Admin,
        }
    }

    /// `Authorization` header value carrying an access token for `user`.
    pub(crate) fn bearer(user: &AuthUser) -> String {
        let token = generate_access_token(
            user.user_id,
            user.username.clone(),
            user.role.id(),
            &Config::for_tests().jwt_secret,
            60,
        )
        .unwrap();
        format!("Bearer {token}")
    }
}
