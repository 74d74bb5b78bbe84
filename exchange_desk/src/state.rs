use common::Exchange;

pub struct AppState {
    pub exchange: Exchange,
}

impl AppState {
    pub fn new(exchange: Exchange) -> Self {
        AppState { exchange }
    }
}
