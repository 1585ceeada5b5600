pub mod crm;
pub mod hubspot;
pub mod mailer;
