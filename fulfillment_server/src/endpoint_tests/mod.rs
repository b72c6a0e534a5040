mod flow;
mod helpers;
mod identity;
mod mocks;
mod orders;
mod withdrawals;
