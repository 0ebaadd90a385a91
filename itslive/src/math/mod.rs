mod gradient;
mod grid;
mod linspace;
mod pchip;
mod rk;

pub(crate) use {
    gradient::gradient,
    grid::{bilinear, fractional_index, nearest},
    linspace::linspace,
    pchip::Pchip,
    rk::bogacki_shampine,
};
