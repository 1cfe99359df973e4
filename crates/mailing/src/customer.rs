use tracing::{debug, info};

use mailman_core::DomainError;

use crate::error::MailingError;
use crate::model::{Customer, NewCustomer};
use crate::repository::CustomerRepository;

/// Creates customers, keeping email addresses unique.
pub struct CustomerCreator<'a, R: ?Sized> {
    repository: &'a R,
}

impl<'a, R> CustomerCreator<'a, R>
where
    R: CustomerRepository + ?Sized,
{
    pub fn new(repository: &'a R) -> Self {
        Self { repository }
    }

    pub async fn create_from_email(&self, email: &str) -> Result<Customer, MailingError> {
        self.create(NewCustomer {
            email: email.to_string(),
        })
        .await
    }

    /// Store a customer. Fails with `BadInput` if the email is already taken.
    pub async fn create(&self, customer: NewCustomer) -> Result<Customer, MailingError> {
        self.assert_email_is_not_used(&customer.email).await?;

        debug!("creating a new customer");
        let customer = self
            .repository
            .insert_customer(customer)
            .await
            .map_err(|e| MailingError::repository("error creating customer", e))?;

        info!(customer_id = %customer.id, "created customer");
        Ok(customer)
    }

    async fn assert_email_is_not_used(&self, email: &str) -> Result<(), MailingError> {
        match self.repository.find_customer_by_email(email).await {
            Ok(customer) => {
                debug!(customer_id = %customer.id, "email is already used");
                Err(DomainError::bad_input("customer with this email already exists").into())
            }
            Err(e) if e.is_no_rows() => {
                debug!("no customer found, email is available");
                Ok(())
            }
            Err(e) => Err(MailingError::repository(
                "error checking if customer with an email already exists",
                e,
            )),
        }
    }
}
