mod analyser;
mod capture;
mod effect;
mod session;
