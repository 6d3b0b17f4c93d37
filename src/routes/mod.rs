use crate::middleware::mw_ctx::CtxState;
use crate::services::listing_service::ListingService;

pub mod comments;
pub mod likes;
pub mod playlists;
pub mod subscriptions;
pub mod tweets;
pub mod videos;

pub(crate) fn listing_service(state: &CtxState) -> ListingService<'_> {
    ListingService::new(state.store.as_ref(), state.max_page_size, state.db_timeout)
}
