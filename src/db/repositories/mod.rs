mod assignments;
mod flights;
mod labels;
mod locations;
