#![allow(dead_code)]

use std::sync::Once;

use weft::prelude::*;

pub const AGENTS_SMALL: usize = 1_000;
pub const AGENTS_MED: usize = 10_000;
pub const AGENTS_LARGE: usize = 100_000;

#[derive(Clone, Copy)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

#[derive(Clone, Copy)]
pub struct Wealth {
    pub value: f32,
}

#[derive(Clone, Copy)]
pub struct Productivity {
    pub rate: f32,
}

static INIT: Once = Once::new();

pub fn init_components() {
    INIT.call_once(|| {
        register_component::<Position>().unwrap();
        register_component::<Wealth>().unwrap();
        register_component::<Productivity>().unwrap();
        freeze_components().unwrap();
    });
}

pub fn populate(world: &mut World, n: usize) -> WorldResult<()> {
    for i in 0..n {
        let bundle = Bundle::new()
            .with(Position {
                x: i as f32,
                y: 0.0,
            })?
            .with(Wealth { value: 100.0 })?;
        world.spawn(bundle)?;
    }
    Ok(())
}
