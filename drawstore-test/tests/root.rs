mod animation;
mod draw;
mod rt;
