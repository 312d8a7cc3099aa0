pub mod audit;
pub mod fsm;
pub mod gate;
pub mod protocol;
pub mod rank;
pub mod schema;
pub mod score;
pub mod sheet;
