use fake::faker::internet::en::{SafeEmail, Username};
use fake::faker::name::en::Name;
use fake::Fake;
use vidshare_server::database::document::{new_record_id, to_document};
use vidshare_server::entities::user::{self, User};
use vidshare_server::middleware::mw_ctx::CtxState;

#[allow(dead_code)]
pub struct TestUser {
    pub id: String,
    pub username: String,
    pub token: String,
}

/// Stores a generated user and signs a login token for it.
#[allow(dead_code)]
pub async fn create_fake_user(ctx_state: &CtxState) -> TestUser {
    let user = User {
        id: new_record_id(user::TABLE_NAME),
        username: Username().fake(),
        email: SafeEmail().fake(),
        full_name: Some(Name().fake()),
        avatar: None,
    };
    let mut doc = to_document(&user).expect("user serializes");
    doc.insert("password".to_string(), "not-exposed".into());
    ctx_state
        .store
        .insert(user::TABLE_NAME, doc)
        .await
        .expect("user stored");
    let token = ctx_state.jwt.create_by_login(&user.id).expect("token signed");
    TestUser {
        id: user.id,
        username: user.username,
        token,
    }
}
