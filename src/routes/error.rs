use rocket::serde::Serialize;
use rocket::serde::json::Json;
use rocket::{Request, catch};

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct Error {
    pub message: String,
}

fn message(text: &str) -> Json<Error> {
    Json(Error { message: text.to_string() })
}

#[catch(400)]
pub fn bad_request(_: &Request) -> Json<Error> {
    message("Bad request")
}

#[catch(404)]
pub fn not_found(_: &Request) -> Json<Error> {
    message("Not found")
}

#[catch(409)]
pub fn conflict(_: &Request) -> Json<Error> {
    message("Conflict")
}

#[catch(422)]
pub fn unprocessable_entity(_: &Request) -> Json<Error> {
    message("Malformed request body")
}

#[catch(500)]
pub fn internal_error(_: &Request) -> Json<Error> {
    message("Internal server error")
}
