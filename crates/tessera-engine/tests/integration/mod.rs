mod documents;
mod schema_evolution;
mod search;
mod suggest;
