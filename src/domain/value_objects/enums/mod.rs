pub mod delivery_modes;
